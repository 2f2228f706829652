//! User endpoints

use crate::TwitterClient;
use crate::error::Result;
use crate::payload::UserPayload;
use trawl_core::domain::user::TwitterUser;

impl TwitterClient {
    /// Fetch a user by numeric id
    ///
    /// # Arguments
    /// * `user_id` - The user id as a decimal string
    pub async fn get_user(&self, user_id: &str) -> Result<TwitterUser> {
        let payload: UserPayload = self
            .get_json("/1.1/users/show.json", &[("user_id", user_id)])
            .await?;

        Ok(payload.into())
    }

    /// Fetch a user by screen name
    ///
    /// # Arguments
    /// * `screen_name` - The handle, with or without a leading `@`
    pub async fn get_user_by_name(&self, screen_name: &str) -> Result<TwitterUser> {
        let screen_name = screen_name.trim_start_matches('@');
        let payload: UserPayload = self
            .get_json("/1.1/users/show.json", &[("screen_name", screen_name)])
            .await?;

        Ok(payload.into())
    }
}
