use serde::{Deserialize, Serialize};

/// Customer record as read from the collaborator store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    /// Collaborator-assigned customer identifier
    pub id: String,
    pub email: Option<String>,
    /// Raw usage-count metafield value, in whichever encoding it was stored
    pub quota_raw: Option<String>,
}

/// One page of customers from the collaborator store
#[derive(Debug, Clone)]
pub struct CustomerPage {
    pub customers: Vec<Customer>,
    /// Cursor for the next page, None when this is the last page
    pub next_cursor: Option<String>,
}
