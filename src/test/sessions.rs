#[cfg(test)]
mod tests {
    use crate::{
        auth::UserSession,
        db::{
            clean_expired_sessions, create_user_session, get_session_by_token, invalidate_session,
        },
        error::AppError,
        test::utils::TestDbBuilder,
    };
    use chrono::{Duration, NaiveDateTime, Utc};
    use rocket::tokio;
    use sqlx::{Pool, Sqlite};

    async fn session_fixture() -> (i64, String, NaiveDateTime, Pool<Sqlite>) {
        let test_db = TestDbBuilder::new()
            .member("session_user")
            .build()
            .await
            .expect("Failed to build test database");

        let user_id = test_db.user_id("session_user").expect("User not found");
        let token = UserSession::generate_token();
        let expires_at = (Utc::now() + Duration::hours(1)).naive_utc();

        (user_id, token, expires_at, test_db.pool)
    }

    #[tokio::test]
    async fn test_create_and_get_session() {
        let (user_id, token, expires_at, pool) = session_fixture().await;

        let session_id = create_user_session(&pool, user_id, &token, expires_at)
            .await
            .expect("Failed to create session");
        assert!(session_id > 0);

        let session = get_session_by_token(&pool, &token)
            .await
            .expect("Failed to get session");

        assert_eq!(session.user_id, user_id);
        assert_eq!(session.token, token);
        assert!(session.is_valid());

        let drift =
            (session.expires_at.and_utc().timestamp() - expires_at.and_utc().timestamp()).abs();
        assert!(drift <= 1, "Expiry should round-trip within a second");
    }

    #[tokio::test]
    async fn test_unknown_token_is_rejected() {
        let (_, _, _, pool) = session_fixture().await;

        match get_session_by_token(&pool, "no_such_token").await {
            Err(AppError::Authentication(msg)) => assert_eq!(msg, "Invalid session token"),
            other => panic!("Expected Authentication error, got {:?}", other.map(|s| s.id)),
        }
    }

    #[tokio::test]
    async fn test_invalidate_session() {
        let (user_id, token, expires_at, pool) = session_fixture().await;

        create_user_session(&pool, user_id, &token, expires_at)
            .await
            .expect("Failed to create session");
        assert!(get_session_by_token(&pool, &token).await.is_ok());

        invalidate_session(&pool, &token)
            .await
            .expect("Failed to invalidate session");

        assert!(get_session_by_token(&pool, &token).await.is_err());
    }

    #[tokio::test]
    async fn test_clean_expired_sessions() {
        let (user_id, _, _, pool) = session_fixture().await;

        let expired = UserSession::generate_token();
        let soon = UserSession::generate_token();
        let later = UserSession::generate_token();

        create_user_session(&pool, user_id, &expired, (Utc::now() - Duration::hours(1)).naive_utc())
            .await
            .expect("Failed to create expired session");
        create_user_session(&pool, user_id, &soon, (Utc::now() + Duration::minutes(1)).naive_utc())
            .await
            .expect("Failed to create session");
        create_user_session(&pool, user_id, &later, (Utc::now() + Duration::days(1)).naive_utc())
            .await
            .expect("Failed to create session");

        let cleaned = clean_expired_sessions(&pool)
            .await
            .expect("Failed to clean expired sessions");
        assert_eq!(cleaned, 1);

        assert!(get_session_by_token(&pool, &expired).await.is_err());
        assert!(get_session_by_token(&pool, &soon).await.is_ok());
        assert!(get_session_by_token(&pool, &later).await.is_ok());
    }

    #[tokio::test]
    async fn test_expired_session_is_not_valid() {
        let (user_id, token, _, pool) = session_fixture().await;

        create_user_session(&pool, user_id, &token, (Utc::now() - Duration::hours(1)).naive_utc())
            .await
            .expect("Failed to create expired session");

        let session = get_session_by_token(&pool, &token)
            .await
            .expect("Expired rows are still readable until cleaned");
        assert!(!session.is_valid());
    }
}
