//! Admin table page
//!
//! Turns one request into a [`TablePage`]: runs the reset, refresh and export
//! actions, then queries the dataset for the requested view. Rendering the
//! page is left to the host.

use log::{info, warn};
use serde::Serialize;
use std::sync::Arc;

use crate::data::{Dataset, Row, DEFAULT_TITLE};
use crate::export::{parse_ids, select_for_export, to_csv};
use crate::proxy::DatasetProxy;
use crate::request::RequestParams;
use crate::table::{self, QueryParams, ViewResult, DEFAULT_PER_PAGE, EMPTY_MESSAGE};

pub const REFRESHED_MESSAGE: &str = "The data has been refreshed!";
pub const EXPORTED_MESSAGE: &str = "The export has been completed successfully!";

/// Request key holding the selected row ids
pub const SELECTOR_PARAM: &str = "mp_item";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

/// One-shot message shown above the table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Rows picked for export and their CSV rendering
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportData {
    pub rows: Vec<Row>,
    pub csv: String,
}

/// Everything the host needs to render the admin page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TablePage {
    pub title: String,
    /// `None` when no data could be obtained at all
    pub view: Option<ViewResult>,
    pub notices: Vec<Notice>,
    pub export: Option<ExportData>,
}

impl TablePage {
    /// Message for a view that filtered down to nothing
    pub fn empty_message(&self) -> Option<&'static str> {
        match &self.view {
            Some(view) if view.is_empty() => Some(EMPTY_MESSAGE),
            _ => None,
        }
    }
}

/// Drives the admin table for a cached dataset
#[derive(Debug)]
pub struct TableController {
    proxy: Arc<DatasetProxy>,
    per_page: usize,
}

impl TableController {
    pub fn new(proxy: Arc<DatasetProxy>) -> Self {
        Self {
            proxy,
            per_page: DEFAULT_PER_PAGE,
        }
    }

    /// Page size used when the request does not set `per_page`
    pub fn per_page(mut self, per_page: usize) -> Self {
        if per_page > 0 {
            self.per_page = per_page;
        }
        self
    }

    /// Handles one page request
    pub async fn render(&self, params: &RequestParams) -> TablePage {
        let mut notices = Vec::new();

        let result = if params.flag("reset") {
            self.proxy.reset().await
        } else if params.flag("refresh") {
            let result = self.proxy.get_or_refresh(true).await;
            if result.is_ok() {
                notices.push(Notice::success(REFRESHED_MESSAGE));
            }
            result
        } else {
            self.proxy.get_or_refresh(false).await
        };

        let dataset = match result {
            Ok(dataset) => dataset,
            Err(e) => {
                notices.push(Notice::error(e.to_string()));
                // A failed read leaves any previous entry in place; show it
                match self.proxy.cached_entry() {
                    Some(entry) => entry.value,
                    None => {
                        return TablePage {
                            title: DEFAULT_TITLE.to_string(),
                            view: None,
                            notices,
                            export: None,
                        };
                    }
                }
            }
        };

        let export = if params.get("action").as_deref() == Some("export") {
            self.export(&dataset, params, &mut notices)
        } else {
            None
        };

        let view = table::query(&dataset, &QueryParams::from_request(params, self.per_page));

        TablePage {
            title: dataset.display_title().to_string(),
            view: Some(view),
            notices,
            export,
        }
    }

    fn export(
        &self,
        dataset: &Dataset,
        params: &RequestParams,
        notices: &mut Vec<Notice>,
    ) -> Option<ExportData> {
        let ids = parse_ids(params.get_all(SELECTOR_PARAM));
        let rows = match select_for_export(dataset, &ids) {
            Ok(rows) => rows,
            Err(e) => {
                notices.push(Notice::warning(e.to_string()));
                return None;
            }
        };

        match to_csv(dataset, &rows) {
            Ok(csv) => {
                info!("exported {} row(s)", rows.len());
                notices.push(Notice::success(EXPORTED_MESSAGE));
                Some(ExportData { rows, csv })
            }
            Err(e) => {
                warn!("export failed: {}", e);
                notices.push(Notice::error(e.to_string()));
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{Cache, MemoryStore};
    use crate::data::{DataNormalizer, DataSource, RawPayload, TransportError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    const PAYLOAD: &str = r#"{
        "title": "People",
        "data": {
            "headers": ["ID", "First Name", "Last Name", "Email", "Date"],
            "rows": {
                "1": { "id": 1, "fname": "Ann", "lname": "Lee", "email": "a@x.com", "date": 1552944355 },
                "2": { "id": 2, "fname": "Bo", "lname": "Kim", "email": "b@x.com", "date": 1556000000 }
            }
        }
    }"#;

    struct SwitchSource {
        up: AtomicBool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl DataSource for SwitchSource {
        async fn fetch(&self) -> Result<RawPayload, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.up.load(Ordering::SeqCst) {
                Ok(RawPayload::new(PAYLOAD))
            } else {
                Err(TransportError::new("upstream responded with HTTP 503"))
            }
        }
    }

    fn controller(up: bool) -> (TableController, Arc<SwitchSource>) {
        let source = Arc::new(SwitchSource {
            up: AtomicBool::new(up),
            calls: AtomicUsize::new(0),
        });
        let proxy = DatasetProxy::new(
            source.clone(),
            DataNormalizer::new(),
            Cache::new(MemoryStore::new(), Duration::from_secs(3600)),
        );
        (TableController::new(Arc::new(proxy)), source)
    }

    fn ids(page: &TablePage) -> Vec<i64> {
        page.view
            .as_ref()
            .map(|v| v.rows.iter().map(|r| r.id).collect())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_plain_request_renders_view() {
        let (controller, _) = controller(true);

        let page = controller.render(&RequestParams::new()).await;

        assert_eq!(page.title, "People");
        assert!(page.notices.is_empty());
        assert_eq!(ids(&page), vec![1, 2]);
        assert_eq!(page.empty_message(), None);
    }

    #[tokio::test]
    async fn test_query_parameters_reach_engine() {
        let (controller, _) = controller(true);

        let page = controller
            .render(&RequestParams::from_query("orderby=id&order=desc&per_page=1"))
            .await;

        assert_eq!(ids(&page), vec![2]);
        assert_eq!(page.view.as_ref().map(|v| v.total_items), Some(2));
    }

    #[tokio::test]
    async fn test_no_match_has_empty_message() {
        let (controller, _) = controller(true);

        let page = controller.render(&RequestParams::from_query("s=zzz")).await;

        assert_eq!(page.empty_message(), Some("Sorry, no people were found."));
    }

    #[tokio::test]
    async fn test_refresh_adds_notice() {
        let (controller, source) = controller(true);
        controller.render(&RequestParams::new()).await;

        let page = controller.render(&RequestParams::from_query("refresh=1")).await;

        assert_eq!(page.notices, vec![Notice::success(REFRESHED_MESSAGE)]);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_no_data_reports_error_without_view() {
        let (controller, _) = controller(false);

        let page = controller.render(&RequestParams::new()).await;

        assert!(page.view.is_none());
        assert_eq!(page.notices[0].level, NoticeLevel::Error);
        assert_eq!(page.title, DEFAULT_TITLE);
    }

    #[tokio::test]
    async fn test_failed_refresh_still_shows_previous_data() {
        let (controller, source) = controller(true);
        controller.render(&RequestParams::new()).await;
        source.up.store(false, Ordering::SeqCst);

        let page = controller.render(&RequestParams::from_query("refresh=1")).await;

        assert_eq!(page.notices.len(), 1);
        assert_eq!(page.notices[0].level, NoticeLevel::Error);
        assert_eq!(ids(&page), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_export_selected_rows_in_dataset_order() {
        let (controller, _) = controller(true);

        let page = controller
            .render(&RequestParams::from_query(
                "action=export&mp_item[]=2&mp_item[]=1&orderby=id&order=desc",
            ))
            .await;

        let export = page.export.expect("export data");
        let exported: Vec<i64> = export.rows.iter().map(|r| r.id).collect();
        assert_eq!(exported, vec![1, 2]);
        assert!(export.csv.starts_with("\"ID\",\"First Name\""));
        assert_eq!(page.notices, vec![Notice::success(EXPORTED_MESSAGE)]);
    }

    #[tokio::test]
    async fn test_export_without_selection_warns() {
        let (controller, _) = controller(true);

        let page = controller.render(&RequestParams::from_query("action=export")).await;

        assert!(page.export.is_none());
        assert_eq!(
            page.notices,
            vec![Notice::warning(
                "You must select at least one item to perform the operation!"
            )]
        );
        assert!(page.view.is_some());
    }

    #[tokio::test]
    async fn test_reset_refetches() {
        let (controller, source) = controller(true);
        controller.render(&RequestParams::new()).await;

        let page = controller.render(&RequestParams::from_query("reset=1")).await;

        assert!(page.notices.is_empty());
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }
}
