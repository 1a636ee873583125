use newswire_core::{Article, Timestamp};
use redb_bincode::ReadableTable as _;
use tracing::{debug, warn};

use crate::{ArticleRecord, Database, DbResult, LOG_TARGET, articles, articles_by_published};

impl Database {
    /// Insert articles, skipping any whose link is already stored
    ///
    /// Runs in a single write transaction. Within one batch the first
    /// occurrence of a link wins. Existing records are never updated.
    ///
    /// Returns the number of newly inserted articles.
    pub async fn insert_articles_skip_duplicates(&self, new_articles: &[Article]) -> DbResult<usize> {
        self.write_with(|tx| {
            let mut articles_table = tx.open_table(&articles::TABLE)?;
            let mut by_published_table = tx.open_table(&articles_by_published::TABLE)?;

            let mut inserted = 0;
            for article in new_articles {
                if articles_table.get(&article.link)?.is_some() {
                    debug!(target: LOG_TARGET, link = %article.link, "Article already stored, skipping");
                    continue;
                }

                articles_table.insert(&article.link, &ArticleRecord::from(article))?;
                by_published_table.insert(&(article.published_at, article.link.clone()), &())?;
                inserted += 1;
            }

            Ok(inserted)
        })
        .await
    }

    /// All articles with `published_at >= cutoff`, newest first
    pub async fn get_articles_published_since(&self, cutoff: Timestamp) -> DbResult<Vec<Article>> {
        self.read_with(|tx| {
            let articles_table = tx.open_table(&articles::TABLE)?;
            let by_published_table = tx.open_table(&articles_by_published::TABLE)?;

            let mut ret = vec![];
            for entry in by_published_table.range(&(cutoff, String::new())..)?.rev() {
                let (k, _) = entry?;
                let (published_at, link) = k.value();

                let Some(record) = articles_table.get(&link)?.map(|g| g.value()) else {
                    warn!(target: LOG_TARGET, %link, %published_at, "Missing article for an index entry?!");
                    continue;
                };

                ret.push(record.into_article(link));
            }

            Ok(ret)
        })
        .await
    }

    pub async fn get_article(&self, link: &str) -> DbResult<Option<Article>> {
        let link = link.to_owned();
        self.read_with(|tx| {
            let articles_table = tx.open_table(&articles::TABLE)?;

            Ok(articles_table
                .get(&link)?
                .map(|g| g.value().into_article(link.clone())))
        })
        .await
    }

    pub async fn count_articles(&self) -> DbResult<usize> {
        self.read_with(|tx| {
            let articles_table = tx.open_table(&articles::TABLE)?;
            let mut count = 0;
            for entry in articles_table.range::<String>(..)? {
                entry?;
                count += 1;
            }
            Ok(count)
        })
        .await
    }
}
