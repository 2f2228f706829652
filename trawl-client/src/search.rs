//! Search endpoint

use crate::TwitterClient;
use crate::error::Result;
use crate::payload::SearchPayload;

impl TwitterClient {
    /// Search for a tweet text and return the screen name of the first author
    ///
    /// Returns `Ok(None)` when nothing matches.
    ///
    /// # Arguments
    /// * `query` - Free text to search for
    pub async fn search_first_author(&self, query: &str) -> Result<Option<String>> {
        let payload: SearchPayload = self
            .get_json(
                "/1.1/search/tweets.json",
                &[("q", query), ("count", "1"), ("result_type", "recent")],
            )
            .await?;

        Ok(payload.first_author())
    }
}
