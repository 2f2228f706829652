//! Status endpoints

use crate::TwitterClient;
use crate::error::Result;
use crate::payload::TweetPayload;
use trawl_core::domain::tweet::Tweet;

impl TwitterClient {
    /// Fetch a single tweet by id
    ///
    /// The returned tweet carries no label; labels come from the dataset the
    /// id was read from.
    ///
    /// # Arguments
    /// * `id` - The tweet id as a decimal string
    pub async fn get_tweet(&self, id: &str) -> Result<Tweet> {
        let payload: TweetPayload = self
            .get_json(
                "/1.1/statuses/show.json",
                &[("id", id), ("tweet_mode", "extended")],
            )
            .await?;

        Ok(payload.into())
    }
}
