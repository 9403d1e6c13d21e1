//! Chapter assembly: page images in, one PDF per chapter out.
//!
//! The artifact on disk is the only record that a chapter was processed.
//! [`ChapterAssembler::already_done`] checks it before any network work.

use crate::download::PageImage;
use crate::error::AssemblyError;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream, dictionary};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Extension of every chapter artifact.
pub const ARTIFACT_EXTENSION: &str = "pdf";

/// Turns a display title into a filesystem-safe file stem.
pub fn sanitize_name(title: &str) -> String {
    title
        .trim()
        .chars()
        .map(|c| match c {
            ' ' => '_',
            '/' | '\\' => '-',
            other => other,
        })
        .collect()
}

/// Where artifacts live.
pub trait ArtifactStore: Send + Sync {
    fn exists(&self, path: &Path) -> bool;

    /// Persists `data` at `path` so readers never see a partial file.
    fn write(&self, path: &Path, data: &[u8]) -> std::io::Result<()>;
}

/// Local filesystem store.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsStore;

impl ArtifactStore for FsStore {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn write(&self, path: &Path, data: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut partial = path.as_os_str().to_owned();
        partial.push(".part");
        let partial = PathBuf::from(partial);

        let result = std::fs::write(&partial, data).and_then(|()| std::fs::rename(&partial, path));
        if result.is_err() {
            let _ = std::fs::remove_file(&partial);
        }
        result
    }
}

/// Result of an assembly attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum AssembleOutcome {
    /// The artifact was already on disk; nothing was done.
    AlreadyPresent(PathBuf),
    /// No images were retrieved; nothing was written.
    Empty,
    /// A new artifact was written.
    Written { path: PathBuf, pages: usize },
}

/// Builds and persists chapter documents under one output directory.
pub struct ChapterAssembler {
    output_dir: PathBuf,
    store: Arc<dyn ArtifactStore>,
}

impl ChapterAssembler {
    pub fn new(output_dir: impl Into<PathBuf>, store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            output_dir: output_dir.into(),
            store,
        }
    }

    /// Assembler writing to the local filesystem.
    pub fn on_disk(output_dir: impl Into<PathBuf>) -> Self {
        Self::new(output_dir, Arc::new(FsStore))
    }

    /// Path of the artifact for an already sanitized chapter name.
    pub fn artifact_path(&self, name: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}.{}", name, ARTIFACT_EXTENSION))
    }

    /// Returns true if this chapter's artifact exists.
    pub fn already_done(&self, name: &str) -> bool {
        self.store.exists(&self.artifact_path(name))
    }

    /// Encodes `images` into one document and stores it.
    pub fn assemble(
        &self,
        name: &str,
        images: &[PageImage],
    ) -> Result<AssembleOutcome, AssemblyError> {
        let path = self.artifact_path(name);
        if self.store.exists(&path) {
            return Ok(AssembleOutcome::AlreadyPresent(path));
        }

        if images.is_empty() {
            return Ok(AssembleOutcome::Empty);
        }

        let pdf = encode_pdf(images)?;
        self.store.write(&path, &pdf)?;

        Ok(AssembleOutcome::Written {
            path,
            pages: images.len(),
        })
    }
}

/// Encodes JPEG pages into a PDF, one page per image.
///
/// Pages are sized to the image in pixels at 72 dpi and the JPEG data is
/// embedded as-is with `DCTDecode`.
pub fn encode_pdf(images: &[PageImage]) -> Result<Vec<u8>, AssemblyError> {
    if images.is_empty() {
        return Err(AssemblyError::Encode("no pages to encode".to_string()));
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::with_capacity(images.len());

    for image in images {
        let width = i64::from(image.width);
        let height = i64::from(image.height);

        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8_i64,
                "Filter" => "DCTDecode",
            },
            image.data.clone(),
        ));

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        Object::Integer(width),
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Integer(height),
                        Object::Integer(0),
                        Object::Integer(0),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode()?));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(width),
                Object::Integer(height),
            ],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
            },
        });
        kids.push(page_id.into());
    }

    let page_count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    Ok(out)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Store keeping artifacts in memory and counting writes.
    #[derive(Default)]
    pub(crate) struct MemoryStore {
        pub(crate) files: Mutex<HashMap<PathBuf, Vec<u8>>>,
    }

    impl ArtifactStore for MemoryStore {
        fn exists(&self, path: &Path) -> bool {
            self.files.lock().unwrap().contains_key(path)
        }

        fn write(&self, path: &Path, data: &[u8]) -> std::io::Result<()> {
            self.files
                .lock()
                .unwrap()
                .insert(path.to_path_buf(), data.to_vec());
            Ok(())
        }
    }

    fn page(index: usize) -> PageImage {
        let normalized =
            crate::download::normalize_image(&crate::download::tests::png_bytes(6, 9)).unwrap();
        PageImage {
            index,
            data: normalized.data,
            width: normalized.width,
            height: normalized.height,
        }
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("Chapter 12"), "Chapter_12");
        assert_eq!(sanitize_name("Vol 1/Chapter 3"), "Vol_1-Chapter_3");
        assert_eq!(sanitize_name("a\\b"), "a-b");
    }

    #[test]
    fn test_encode_pdf_page_count() {
        let pdf = encode_pdf(&[page(0), page(1), page(2)]).unwrap();
        assert!(pdf.starts_with(b"%PDF-1.5"));

        let doc = Document::load_mem(&pdf).unwrap();
        assert_eq!(doc.get_pages().len(), 3);
    }

    #[test]
    fn test_encode_pdf_rejects_empty() {
        assert!(encode_pdf(&[]).is_err());
    }

    #[test]
    fn test_assemble_writes_once() {
        let store = Arc::new(MemoryStore::default());
        let assembler = ChapterAssembler::new("out", store.clone());

        let first = assembler.assemble("Chapter_1", &[page(0)]).unwrap();
        assert_eq!(
            first,
            AssembleOutcome::Written {
                path: PathBuf::from("out/Chapter_1.pdf"),
                pages: 1,
            }
        );
        assert!(assembler.already_done("Chapter_1"));

        let second = assembler.assemble("Chapter_1", &[page(0), page(1)]).unwrap();
        assert_eq!(
            second,
            AssembleOutcome::AlreadyPresent(PathBuf::from("out/Chapter_1.pdf"))
        );
        assert_eq!(store.files.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_assemble_empty_writes_nothing() {
        let store = Arc::new(MemoryStore::default());
        let assembler = ChapterAssembler::new("out", store.clone());

        assert_eq!(
            assembler.assemble("Chapter_2", &[]).unwrap(),
            AssembleOutcome::Empty
        );
        assert!(!assembler.already_done("Chapter_2"));
        assert!(store.files.lock().unwrap().is_empty());
    }

    #[test]
    fn test_fs_store_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("library");
        let assembler = ChapterAssembler::on_disk(&output);

        assert!(!assembler.already_done("Chapter_5"));
        assembler.assemble("Chapter_5", &[page(0)]).unwrap();

        let path = output.join("Chapter_5.pdf");
        assert!(path.exists());
        assert!(!output.join("Chapter_5.pdf.part").exists());
        assert!(assembler.already_done("Chapter_5"));
    }

    #[test]
    fn test_fs_store_failed_write_leaves_no_partial() {
        let dir = tempfile::tempdir().unwrap();
        // A non-empty directory where the artifact should go makes the rename fail.
        let target = dir.path().join("Chapter_9.pdf");
        std::fs::create_dir_all(target.join("occupied")).unwrap();

        assert!(FsStore.write(&target, b"%PDF-1.5").is_err());
        assert!(!dir.path().join("Chapter_9.pdf.part").exists());
    }
}
