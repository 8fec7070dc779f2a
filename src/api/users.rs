use super::client::ApiClient;
use crate::error::Result;
use crate::models::User;
use serde_json::json;

pub const ME: &str = r#"
query Me {
  me { id email name avatarUrl emailVerified isActive createdAt updatedAt }
}"#;

pub async fn me(client: &ApiClient) -> Result<User> {
    client.query(ME, "Me", json!({}), "me").await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{signed_in_client, FakeTransport};

    #[tokio::test]
    async fn me_carries_bearer() {
        let transport = FakeTransport::new().respond(
            "Me",
            json!({ "me": { "id": "u1", "email": "ada@example.com", "name": "Ada" } }),
        );
        let client = signed_in_client(transport.clone()).await;

        let user = me(&client).await.unwrap();
        assert_eq!(user.name, "Ada");
        assert!(user.is_active);
        assert_eq!(transport.last("Me").unwrap().bearer.as_deref(), Some("access"));
    }
}
