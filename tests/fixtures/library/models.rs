use serde::{Deserialize, Serialize};

/// A book in the catalog
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: u64,
    pub title: String,
    pub author_name: String,
    pub genre: Genre,
    pub subtitle: Option<String>,
}

#[derive(Deserialize)]
pub struct NewBook {
    pub title: String,
    pub author_name: String,
    #[serde(default)]
    pub genre: Genre,
}

#[derive(Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Genre {
    #[default]
    Fiction,
    Poetry,
    History,
}
