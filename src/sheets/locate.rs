use serde::Serialize;
use tracing::{debug, info};

use crate::connectors::SpreadsheetService;
use crate::error::SyncError;
use crate::models::FileRef;

/// Name used when nothing else is configured.
pub const DEFAULT_SHEET_NAME: &str = "job-apps-organizer";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SheetHandle {
    pub id: String,
    pub name: String,
    /// True when this run had to create the spreadsheet.
    pub created: bool,
}

/// Walks every page of the listing and returns the first spreadsheet whose
/// name matches exactly.
pub async fn find_by_name(
    sheets: &dyn SpreadsheetService,
    name: &str,
) -> Result<Option<FileRef>, SyncError> {
    let mut page_token: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = sheets.list_spreadsheets(name, page_token.as_deref()).await?;
        pages += 1;
        if let Some(found) = page.files.into_iter().find(|file| file.name == name) {
            debug!(id = %found.id, pages, "found spreadsheet");
            return Ok(Some(found));
        }
        match page.next_page_token {
            Some(token) => page_token = Some(token),
            None => {
                debug!(pages, "no spreadsheet named {name}");
                return Ok(None);
            }
        }
    }
}

pub async fn find_or_create(
    sheets: &dyn SpreadsheetService,
    name: &str,
) -> Result<SheetHandle, SyncError> {
    if let Some(file) = find_by_name(sheets, name).await? {
        return Ok(SheetHandle {
            id: file.id,
            name: file.name,
            created: false,
        });
    }

    let id = sheets.create_spreadsheet(name).await?;
    info!(%id, "created spreadsheet {name}");
    Ok(SheetHandle {
        id,
        name: name.to_string(),
        created: true,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::Value;

    use super::{find_by_name, find_or_create};
    use crate::connectors::SpreadsheetService;
    use crate::error::SyncError;
    use crate::models::{FilePage, FileRef};

    /// Listing split over pages; `pages[i]` is served for token `i`.
    struct PagedDrive {
        pages: Vec<Vec<(&'static str, &'static str)>>,
        created: Mutex<Vec<String>>,
    }

    #[async_trait(?Send)]
    impl SpreadsheetService for PagedDrive {
        fn name(&self) -> &str {
            "paged-drive"
        }

        async fn list_spreadsheets(
            &self,
            _name: &str,
            page_token: Option<&str>,
        ) -> Result<FilePage, SyncError> {
            let index: usize = page_token.map(|t| t.parse().expect("numeric token")).unwrap_or(0);
            let files = self
                .pages
                .get(index)
                .map(|page| {
                    page.iter()
                        .map(|(id, name)| FileRef {
                            id: id.to_string(),
                            name: name.to_string(),
                        })
                        .collect()
                })
                .unwrap_or_default();
            Ok(FilePage {
                files,
                next_page_token: (index + 1 < self.pages.len()).then(|| (index + 1).to_string()),
            })
        }

        async fn create_spreadsheet(&self, title: &str) -> Result<String, SyncError> {
            self.created.lock().expect("lock created").push(title.to_string());
            Ok("new-sheet".to_string())
        }

        async fn get_range(&self, _id: &str, _range: &str) -> Result<Vec<Vec<Value>>, SyncError> {
            Ok(Vec::new())
        }

        async fn update_range(
            &self,
            _id: &str,
            _range: &str,
            _values: Vec<Vec<Value>>,
        ) -> Result<(), SyncError> {
            Ok(())
        }
    }

    fn drive(pages: Vec<Vec<(&'static str, &'static str)>>) -> PagedDrive {
        PagedDrive {
            pages,
            created: Mutex::new(Vec::new()),
        }
    }

    #[tokio::test]
    async fn finds_exact_name_on_a_later_page() {
        let drive = drive(vec![
            vec![("a", "job-apps-organizer (copy)")],
            vec![("b", "Job-Apps-Organizer"), ("c", "job-apps-organizer")],
        ]);
        let handle = find_or_create(&drive, "job-apps-organizer")
            .await
            .expect("find sheet");
        assert_eq!(handle.id, "c");
        assert!(!handle.created);
        assert!(drive.created.lock().expect("lock created").is_empty());
    }

    #[tokio::test]
    async fn creates_when_absent() {
        let drive = drive(vec![vec![("a", "something else")]]);
        let handle = find_or_create(&drive, "job-apps-organizer")
            .await
            .expect("create sheet");
        assert_eq!(handle.id, "new-sheet");
        assert!(handle.created);
        assert_eq!(
            *drive.created.lock().expect("lock created"),
            vec!["job-apps-organizer".to_string()]
        );
    }

    #[tokio::test]
    async fn find_only_never_creates() {
        let drive = drive(Vec::new());
        let found = find_by_name(&drive, "job-apps-organizer")
            .await
            .expect("list sheets");
        assert!(found.is_none());
        assert!(drive.created.lock().expect("lock created").is_empty());
    }
}
