use crate::{error::ApiError, spotify::client::Client, types::PrivateUser};

/// Retrieves the profile of the user the session belongs to (`GET me`).
pub async fn current_user(client: &Client) -> Result<PrivateUser, ApiError> {
    let user: Option<PrivateUser> = client.get("me", &[]).await?;
    Ok(user.unwrap_or_default())
}
