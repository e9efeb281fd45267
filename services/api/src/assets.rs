//! services/api/src/assets.rs
//!
//! The asset gate: resolves a book's protected file for an authenticated
//! identity and records the read or download in the usage ledger.

use crate::auth::Identity;
use crate::error::AppError;
use library_core::domain::{BookId, UsageEventId, UsageKind};
use library_core::ledger::UsageLedger;
use library_core::ports::{AssetStorage, DatabaseService, PortError};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

/// When a usage event is written relative to the asset existence check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UsageAccounting {
    /// Check the file exists, then record. A failed serve is never counted.
    #[default]
    OnSuccess,
    /// Record first, then check. A request for a vanished file is still counted.
    BestEffort,
}

#[derive(Debug, thiserror::Error)]
#[error("expected 'on-success' or 'best-effort', got '{0}'")]
pub struct UnknownAccounting(String);

impl FromStr for UsageAccounting {
    type Err = UnknownAccounting;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "on-success" | "on_success" => Ok(UsageAccounting::OnSuccess),
            "best-effort" | "best_effort" => Ok(UsageAccounting::BestEffort),
            _ => Err(UnknownAccounting(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Inline,
    Attachment,
}

impl From<UsageKind> for Disposition {
    fn from(kind: UsageKind) -> Self {
        match kind {
            UsageKind::Read => Disposition::Inline,
            UsageKind::Download => Disposition::Attachment,
        }
    }
}

/// Everything the transport needs to stream an asset back.
#[derive(Debug, Clone)]
pub struct ServedAsset {
    pub path: PathBuf,
    pub content_type: &'static str,
    pub disposition: Disposition,
    /// Suggested file name: `<title>.pdf`.
    pub file_name: String,
    pub event_id: UsageEventId,
}

impl ServedAsset {
    /// The `Content-Disposition` header value for this asset.
    pub fn content_disposition(&self) -> String {
        match self.disposition {
            Disposition::Inline => "inline".to_string(),
            Disposition::Attachment => format!("attachment; filename=\"{}\"", self.file_name),
        }
    }
}

#[derive(Clone)]
pub struct AssetGate {
    db: Arc<dyn DatabaseService>,
    storage: Arc<dyn AssetStorage>,
    ledger: UsageLedger,
    accounting: UsageAccounting,
}

impl AssetGate {
    pub fn new(
        db: Arc<dyn DatabaseService>,
        storage: Arc<dyn AssetStorage>,
        accounting: UsageAccounting,
    ) -> Self {
        Self {
            ledger: UsageLedger::new(db.clone()),
            db,
            storage,
            accounting,
        }
    }

    /// Resolves the book's file for `identity` and records exactly one usage
    /// event of `kind`. Any authenticated role may read or download.
    pub async fn serve(
        &self,
        book_id: BookId,
        identity: &Identity,
        kind: UsageKind,
    ) -> Result<ServedAsset, AppError> {
        let book = self.db.get_book(book_id).await.map_err(|e| match e {
            PortError::NotFound(_) => AppError::NotFound("Book not found".to_string()),
            other => other.into(),
        })?;

        let Some(reference) = book.file_url.as_deref() else {
            warn!("Book {} has no file attached", book.id);
            return Err(AppError::AssetMissing);
        };

        let (path, event_id) = match self.accounting {
            UsageAccounting::OnSuccess => {
                let path = self.locate(book.id, reference).await?;
                let event_id = self.ledger.record(kind, identity.user_id, book.id).await?;
                (path, event_id)
            }
            UsageAccounting::BestEffort => {
                let event_id = self.ledger.record(kind, identity.user_id, book.id).await?;
                let path = self.locate(book.id, reference).await?;
                (path, event_id)
            }
        };

        info!(
            "User {} {:?} book {} (event {})",
            identity.user_id, kind, book.id, event_id
        );

        Ok(ServedAsset {
            content_type: content_type_for(&path),
            disposition: kind.into(),
            file_name: attachment_file_name(&book.title),
            path,
            event_id,
        })
    }

    async fn locate(&self, book_id: BookId, reference: &str) -> Result<PathBuf, AppError> {
        self.storage.locate(reference).await?.ok_or_else(|| {
            warn!("Book {} references missing asset {}", book_id, reference);
            AppError::AssetMissing
        })
    }
}

pub fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match extension.as_deref() {
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("epub") => "application/epub+zip",
        _ => "application/octet-stream",
    }
}

/// `<title>.pdf`, with characters that would break the header value replaced.
pub fn attachment_file_name(title: &str) -> String {
    let cleaned: String = title
        .trim()
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.trim().is_empty() {
        "book.pdf".to_string()
    } else {
        format!("{}.pdf", cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryDb, LocalAssetStorage};
    use bytes::Bytes;
    use library_core::domain::{AssetKind, NewBook, Role};
    use rstest::rstest;

    struct Fixture {
        db: Arc<InMemoryDb>,
        storage: Arc<LocalAssetStorage>,
        _uploads: tempfile::TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let uploads = tempfile::tempdir().unwrap();
            Self {
                db: Arc::new(InMemoryDb::new()),
                storage: Arc::new(LocalAssetStorage::new(uploads.path())),
                _uploads: uploads,
            }
        }

        fn gate(&self, accounting: UsageAccounting) -> AssetGate {
            AssetGate::new(self.db.clone(), self.storage.clone(), accounting)
        }

        async fn book(&self, file_url: Option<String>) -> BookId {
            self.db
                .create_book(NewBook {
                    title: "Moby Dick".to_string(),
                    file_url,
                    ..Default::default()
                })
                .await
                .unwrap()
                .id
        }

        async fn stored_pdf(&self) -> String {
            self.storage
                .store(AssetKind::Document, "moby.pdf", Bytes::from_static(b"%PDF"))
                .await
                .unwrap()
        }

        async fn events(&self, kind: UsageKind, book_id: BookId) -> usize {
            self.db.usage_for_book(kind, book_id).await.unwrap().len()
        }
    }

    const READER: Identity = Identity {
        user_id: 42,
        role: Role::User,
    };

    #[tokio::test]
    async fn serving_records_exactly_one_event() {
        let fx = Fixture::new();
        let reference = fx.stored_pdf().await;
        let book_id = fx.book(Some(reference)).await;

        let served = fx
            .gate(UsageAccounting::OnSuccess)
            .serve(book_id, &READER, UsageKind::Read)
            .await
            .unwrap();

        assert_eq!(served.content_type, "application/pdf");
        assert_eq!(served.content_disposition(), "inline");
        assert_eq!(fx.events(UsageKind::Read, book_id).await, 1);
        assert_eq!(fx.events(UsageKind::Download, book_id).await, 0);
    }

    #[tokio::test]
    async fn downloads_are_attachments_named_after_the_title() {
        let fx = Fixture::new();
        let reference = fx.stored_pdf().await;
        let book_id = fx.book(Some(reference)).await;

        let served = fx
            .gate(UsageAccounting::OnSuccess)
            .serve(book_id, &READER, UsageKind::Download)
            .await
            .unwrap();

        assert_eq!(
            served.content_disposition(),
            "attachment; filename=\"Moby Dick.pdf\""
        );
        assert_eq!(fx.events(UsageKind::Download, book_id).await, 1);
    }

    #[tokio::test]
    async fn unknown_books_are_not_found() {
        let fx = Fixture::new();
        let err = fx
            .gate(UsageAccounting::OnSuccess)
            .serve(999, &READER, UsageKind::Read)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[rstest]
    #[case::on_success(UsageAccounting::OnSuccess, 0)]
    #[case::best_effort(UsageAccounting::BestEffort, 1)]
    #[tokio::test]
    async fn missing_files_fail_and_accounting_follows_policy(
        #[case] accounting: UsageAccounting,
        #[case] expected_events: usize,
    ) {
        let fx = Fixture::new();
        let book_id = fx.book(Some("/uploads/files/gone.pdf".to_string())).await;

        let err = fx
            .gate(accounting)
            .serve(book_id, &READER, UsageKind::Read)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::AssetMissing));
        assert_eq!(fx.events(UsageKind::Read, book_id).await, expected_events);
    }

    #[tokio::test]
    async fn books_without_a_file_are_missing_assets() {
        let fx = Fixture::new();
        let book_id = fx.book(None).await;

        let err = fx
            .gate(UsageAccounting::BestEffort)
            .serve(book_id, &READER, UsageKind::Download)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AssetMissing));
        assert_eq!(fx.events(UsageKind::Download, book_id).await, 0);
    }

    #[rstest]
    #[case("on-success", UsageAccounting::OnSuccess)]
    #[case("BEST-EFFORT", UsageAccounting::BestEffort)]
    #[case("best_effort", UsageAccounting::BestEffort)]
    fn accounting_parses(#[case] raw: &str, #[case] expected: UsageAccounting) {
        assert_eq!(raw.parse::<UsageAccounting>().unwrap(), expected);
    }

    #[test]
    fn header_breaking_characters_are_replaced() {
        assert_eq!(attachment_file_name("The \"Best\" Book"), "The _Best_ Book.pdf");
        assert_eq!(attachment_file_name("Café"), "Caf_.pdf");
        assert_eq!(attachment_file_name("   "), "book.pdf");
    }

    #[test]
    fn content_types_follow_extensions() {
        assert_eq!(content_type_for(Path::new("a/b.PDF")), "application/pdf");
        assert_eq!(content_type_for(Path::new("cover.jpeg")), "image/jpeg");
        assert_eq!(content_type_for(Path::new("blob")), "application/octet-stream");
    }
}
