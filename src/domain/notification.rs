use super::Item;

#[derive(Debug, Clone)]
pub struct Notification {
    pub feed_title: String,
    pub item_title: String,
    pub text: String,
    pub links: Vec<String>,
}

impl Notification {
    pub fn from_item(feed_title: &str, item: &Item) -> Self {
        let mut links = Vec::new();
        if !item.link.is_empty() {
            links.push(item.link.clone());
        }
        if !item.enclosure.url.is_empty() && item.enclosure.url != item.link {
            links.push(item.enclosure.url.clone());
        }

        Self {
            feed_title: feed_title.to_string(),
            item_title: item.title.clone(),
            text: item.description.clone(),
            links,
        }
    }

    /// Format: "{feedTitle} {itemTitle}: {text} {links (if any)}"
    pub fn format(&self) -> String {
        let mut message = format!("{} {}", self.feed_title, self.item_title);

        if !self.text.is_empty() {
            message.push_str(": ");
            message.push_str(&self.text);
        }

        if !self.links.is_empty() {
            message.push(' ');
            message.push_str(&self.links.join(" "));
        }

        message
    }
}
