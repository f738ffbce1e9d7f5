//! HtmlBatchWriter: the CLI's concrete `BatchWriter`. Renders one HTML
//! document per committed `BatchWindow`, one block per `MediaItem`, mirroring
//! the plain-text `video_block` layout `media.rs` already builds.

use crate::error::Result;
use crate::model::{BatchWindow, MediaItem};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::warn;

pub struct HtmlBatchWriter {
    output_dir: PathBuf,
    write_html: bool,
    write_pdf: bool,
}

impl HtmlBatchWriter {
    pub fn new(output_dir: PathBuf, write_html: bool, write_pdf: bool) -> Self {
        Self { output_dir, write_html, write_pdf }
    }

    fn render(&self, window: &BatchWindow, items: &[MediaItem]) -> String {
        let mut body = String::new();
        for item in items {
            body.push_str("<section class=\"sentence\">\n");
            body.push_str(&format!("  <p class=\"source\">{}</p>\n", escape(&item.sentence)));
            body.push_str(&format!("  <p class=\"translation\" lang=\"{}\">{}</p>\n", escape(&item.target_language), escape(&item.translation)));
            if let Some(translit) = &item.transliteration {
                body.push_str(&format!("  <p class=\"transliteration\">{}</p>\n", escape(translit)));
            }
            body.push_str("</section>\n");
        }

        format!(
            "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>Batch {}-{}</title></head>\n<body>\n{}</body>\n</html>\n",
            window.first_number, window.last_number, body
        )
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[async_trait]
impl crate::batch_exporter::BatchWriter for HtmlBatchWriter {
    async fn write_batch(&self, window: BatchWindow, items: Vec<MediaItem>) -> Result<()> {
        if self.write_pdf {
            warn!("output_pdf is set but this build has no PDF renderer wired in; writing HTML only");
        }
        if !self.write_html {
            return Ok(());
        }

        std::fs::create_dir_all(&self.output_dir)?;
        let filename = format!("batch-{}.html", window.range_fragment());
        let path = self.output_dir.join(filename);
        let document = self.render(&window, &items);
        std::fs::write(path, document)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch_exporter::BatchWriter;
    use tempfile::tempdir;

    fn item(index: usize, number: usize) -> MediaItem {
        MediaItem {
            index,
            number,
            target_language: "fr".to_string(),
            sentence: "Hello & goodbye".to_string(),
            translation: "Bonjour".to_string(),
            transliteration: None,
            audio: None,
            video_block: String::new(),
        }
    }

    #[tokio::test]
    async fn writes_one_escaped_html_file_per_window() {
        let dir = tempdir().unwrap();
        let writer = HtmlBatchWriter::new(dir.path().to_path_buf(), true, false);
        let window = BatchWindow { first_number: 1, last_number: 2 };
        writer.write_batch(window.clone(), vec![item(0, 1), item(1, 2)]).await.unwrap();

        let path = dir.path().join(format!("batch-{}.html", window.range_fragment()));
        let contents = std::fs::read_to_string(path).unwrap();
        assert!(contents.contains("Hello &amp; goodbye"));
        assert!(contents.contains("Bonjour"));
    }

    #[tokio::test]
    async fn skips_writing_when_html_output_disabled() {
        let dir = tempdir().unwrap();
        let writer = HtmlBatchWriter::new(dir.path().to_path_buf(), false, false);
        let window = BatchWindow { first_number: 1, last_number: 1 };
        writer.write_batch(window.clone(), vec![item(0, 1)]).await.unwrap();
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }
}
