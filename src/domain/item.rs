use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enclosure {
    pub url: String,
    pub length: u64,
    pub mime_type: String,
}

/// A normalized plain-feed entry as stored in a feed bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub guid: String,
    pub title: String,
    pub link: String,
    pub description: String,
    /// RFC1123Z once normalized, empty if the source date could not be resolved
    pub pub_date: String,
    pub dt: Option<DateTime<Utc>>,
    #[serde(default)]
    pub enclosure: Enclosure,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub junk: bool,
}

impl Item {
    pub fn new(guid: String, title: String) -> Self {
        Self {
            guid,
            title,
            ..Default::default()
        }
    }

    pub fn with_link(mut self, link: String) -> Self {
        self.link = link;
        self
    }

    pub fn with_description(mut self, description: String) -> Self {
        self.description = description;
        self
    }

    pub fn with_pub_date(mut self, pub_date: String) -> Self {
        self.pub_date = pub_date;
        self
    }

    /// Set the resolved timestamp together with its canonical RFC1123Z form.
    pub fn with_dt(mut self, dt: DateTime<Utc>) -> Self {
        self.pub_date = dt.format(crate::sources::dates::RFC1123Z).to_string();
        self.dt = Some(dt);
        self
    }

    pub fn with_enclosure(mut self, enclosure: Enclosure) -> Self {
        self.enclosure = enclosure;
        self
    }

    pub fn with_author(mut self, author: String) -> Self {
        self.author = author;
        self
    }
}
