//! Tag descriptions.
//!
//! [`TagInfo`] is the structured answer to "what is this tag": its category, how
//! many stored images carry it, and whatever the reference database knows about
//! it. [`TagInfo::to_markdown`] renders it for display; the layout is not stable.

use std::fmt;

use super::reference::TagDescription;
use super::TagType;

const WIKI_BASE: &str = "https://safebooru.donmai.us/wiki_pages/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub language: String,
    pub tag: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagInfo {
    pub tag: String,
    pub category: TagType,
    pub count: u64,
    pub wiki_url: String,
    pub aliases: Vec<String>,
    pub other_names: Vec<String>,
    pub translations: Vec<Translation>,
    pub wiki_text: Option<String>,
}

impl TagInfo {
    pub fn from_description(description: TagDescription, count: u64) -> Self {
        let wiki_url = format!("{}{}", WIKI_BASE, urlencoding::encode(&description.name));
        let mut info = TagInfo {
            tag: description.name,
            category: description.category,
            count,
            wiki_url,
            aliases: Vec::new(),
            other_names: Vec::new(),
            translations: Vec::new(),
            wiki_text: None,
        };

        if let Some(general) = description.general {
            info.aliases = general.aliases;
            info.other_names = general.other_names;
            info.translations = [
                ("English", general.en_tag, general.en_desc),
                ("Chinese", general.zh_tag, general.zh_desc),
                ("Japanese", general.jp_tag, general.jp_desc),
            ]
            .into_iter()
            .filter(|(_, tag, desc)| tag.is_some() || desc.is_some())
            .map(|(language, tag, description)| Translation {
                language: language.to_string(),
                tag,
                description,
            })
            .collect();
            info.wiki_text = general.wiki_desc.filter(|s| !s.trim().is_empty());
        }

        info
    }

    /// Markdown rendering of [`TagInfo`]'s `Display` output.
    pub fn to_markdown(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TagInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let category = match self.category {
            TagType::General => "General",
            TagType::Character => "Character",
        };
        let noun = if self.count == 1 { "image" } else { "images" };

        writeln!(f, "# Tag: {}\n", self.tag)?;
        writeln!(f, "Tag category: {}\n", category)?;
        writeln!(f, "Current count: {} {}\n", self.count, noun)?;
        writeln!(f, "Danbooru wiki: [{} - wiki]({})\n", self.tag, self.wiki_url)?;

        if !self.aliases.is_empty() || !self.other_names.is_empty() {
            writeln!(f, "## Aliases\n")?;
            if !self.aliases.is_empty() {
                writeln!(f, "Alias names: {}\n", code_list(&self.aliases))?;
            }
            if !self.other_names.is_empty() {
                writeln!(f, "Other names: {}\n", code_list(&self.other_names))?;
            }
        }

        if !self.translations.is_empty() {
            writeln!(f, "## Translation\n")?;
            for t in &self.translations {
                writeln!(f, "### {} - {}\n", t.language, t.tag.as_deref().unwrap_or(""))?;
                if let Some(desc) = &t.description {
                    writeln!(f, "{}\n", desc)?;
                }
            }
        }

        if let Some(wiki) = &self.wiki_text {
            writeln!(f, "## Raw Wiki Text\n")?;
            writeln!(f, "{}\n", wiki)?;
        }
        Ok(())
    }
}

fn code_list(names: &[String]) -> String {
    names
        .iter()
        .map(|n| format!("`{}`", n))
        .collect::<Vec<_>>()
        .join(", ")
}
