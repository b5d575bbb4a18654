mod request;
mod response;
mod wrapper;

pub use request::*;
pub use response::*;
pub use wrapper::*;

use serde::{Deserialize, Serialize};

use crate::{
    db_helpers::pipeline::{PageRequest, Sort},
    errors::RequestError,
};

/// Query string shared by list endpoints.
#[derive(Deserialize, Serialize, Debug, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct ListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub query: Option<String>,
    pub sort_by: Option<String>,
    pub sort_type: Option<String>,
    pub user_id: Option<String>,
}

impl ListQuery {
    pub fn page_request(&self) -> Result<PageRequest, RequestError> {
        PageRequest::new(self.page, self.limit)
    }

    pub fn sort(&self, allowed: &[(&str, &'static str)], default: &str) -> Result<Sort, RequestError> {
        Sort::from_query(
            self.sort_by.as_deref(),
            self.sort_type.as_deref(),
            allowed,
            default,
        )
    }

    pub fn search_term(&self) -> Option<String> {
        self.query
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(str::to_owned)
    }
}
