use bincode::{Decode, Encode};
use newswire_core::{Article, Timestamp};

#[macro_export]
macro_rules! def_table {
    ($(#[$outer:meta])*
        $name:ident : $k:ty => $v:ty) => {
        #[allow(unused)]
        $(#[$outer])*
        pub mod $name {
            use super::*;
            pub type Key = $k;
            pub type Value = $v;
            pub type Definition<'a> = redb_bincode::TableDefinition<'a, Key, Value>;
            pub type Table<'a> = redb_bincode::Table<'a, Key, Value>;
            pub const TABLE: Definition = redb_bincode::TableDefinition::new(stringify!($name));
        }
    };
}

def_table! {
    /// Tracks database/schema version
    db_version: () => u64
}

def_table! {
    /// All articles ever ingested, keyed by link
    articles: String => ArticleRecord
}

def_table! {
    /// Index of `articles` by publication time
    articles_by_published: (Timestamp, String) => ()
}

#[derive(Debug, Encode, Decode, Clone, PartialEq, Eq)]
pub struct ArticleRecord {
    pub title: String,
    pub score: String,
    pub published_at: Timestamp,
}

impl From<&Article> for ArticleRecord {
    fn from(article: &Article) -> Self {
        Self {
            title: article.title.clone(),
            score: article.score.clone(),
            published_at: article.published_at,
        }
    }
}

impl ArticleRecord {
    pub fn into_article(self, link: String) -> Article {
        Article {
            title: self.title,
            link,
            score: self.score,
            published_at: self.published_at,
        }
    }
}
