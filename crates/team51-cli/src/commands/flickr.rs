//! Flickr commands.

use anyhow::{Result, anyhow};
use team51_clients::flickr::PhotoSummary;
use team51_core::export::ExportFormat;
use team51_core::{CommandOutcome, Table};

use super::{Context, export_to_cwd};

fn photo_table(photos: &[PhotoSummary]) -> Table {
    let mut table = Table::new(["ID", "Title", "Image URL"]);
    for photo in photos {
        table.push_row([photo.id.clone(), photo.title.clone(), photo.image_url()]);
    }
    table
}

pub async fn export_photos(
    ctx: &Context,
    username: &str,
    export: ExportFormat,
    max_pages: Option<u32>,
) -> Result<CommandOutcome> {
    let flickr = ctx.flickr()?;
    let user = flickr
        .find_user(username)
        .await?
        .ok_or_else(|| anyhow!("Flickr user {} not found", username))?;

    let photos = flickr.public_photos(&user.nsid, max_pages).await?;
    if photos.is_empty() {
        return Ok(CommandOutcome::empty(format!("{} has no public photos", username)));
    }

    let table = photo_table(&photos);
    let path = export_to_cwd(&table, export, &format!("flickr-{}-photos", username))?;
    Ok(CommandOutcome::success(format!(
        "Exported {} photos to {}",
        table.len(),
        path.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_photo_table() {
        let photos = vec![PhotoSummary {
            id: "42".to_string(),
            secret: "abc".to_string(),
            server: "65535".to_string(),
            title: "Team photo".to_string(),
        }];
        let table = photo_table(&photos);
        assert_eq!(
            table.rows()[0],
            vec!["42", "Team photo", "https://live.staticflickr.com/65535/42_abc_b.jpg"]
        );
    }
}
