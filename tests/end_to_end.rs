// Client services against a real server on an ephemeral port

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use finance_app::entities::{LoginCredentials, MovementInput, Period, PersonInput};
use finance_app::list::MovementSource;
use finance_app::server::{ensure_admin, router, AppState};
use finance_app::{
    db, ApiError, AppConfig, ListController, ListOptions, LoadOutcome, MovementFilter,
    ServerConfig, Services, Session,
};

struct Harness {
    services: Services,
    session: Arc<Session>,
}

async fn start() -> Harness {
    let server_config = ServerConfig {
        jwt_secret: Some("end-to-end".to_string()),
        admin_username: "admin".to_string(),
        admin_password: "admin123".to_string(),
        ..ServerConfig::default()
    };

    let conn = db::open_in_memory().unwrap();
    ensure_admin(&conn, &server_config).unwrap();
    let state = AppState::new(conn, &server_config).unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });

    let mut config = AppConfig::default();
    config.api.base_url = format!("http://{}", addr);
    let session = Arc::new(Session::in_memory(&config.auth));
    let services = Services::from_config(&config, session.clone()).unwrap();

    Harness { services, session }
}

async fn logged_in() -> Harness {
    let harness = start().await;
    harness
        .services
        .auth
        .login(&LoginCredentials::new("admin", "admin123"))
        .await
        .unwrap();
    harness
}

#[tokio::test]
async fn test_login_session_and_logout() {
    let Harness { services, session } = start().await;

    let rejected = services
        .auth
        .login(&LoginCredentials::new("admin", "wrong"))
        .await;
    assert_eq!(rejected, Err(ApiError::Unauthorized));
    assert!(session.token().is_none());

    let user = services
        .auth
        .login(&LoginCredentials::new("admin", "admin123"))
        .await
        .unwrap();
    assert_eq!(user.username, "admin");
    assert!(services.auth.is_authenticated());
    assert!(services.auth.validate_token().await.unwrap());

    // A refresh rotates both tokens and keeps the session usable
    let before = session.refresh_token();
    services.auth.refresh().await.unwrap();
    assert_ne!(session.refresh_token(), before);
    assert_eq!(services.auth.current_user().await.unwrap().username, "admin");

    services.auth.logout().unwrap();
    assert!(!services.auth.is_authenticated());
    assert_eq!(
        services.persons.get(1).await,
        Err(ApiError::Unauthorized)
    );
}

/// Token the server would have issued an hour ago, long expired
fn expired_token() -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let now = chrono::Utc::now().timestamp();
    let claims = serde_json::json!({
        "id": 1,
        "username": "admin",
        "iat": now - 7200,
        "exp": now - 3600,
    });
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{}.{}.signature", header, payload)
}

#[tokio::test]
async fn test_expired_access_token_is_refreshed_not_logged_out() {
    let Harness { services, session } = logged_in().await;
    let refresh_token = session.refresh_token().unwrap();

    // Coming back after the access token lapsed, refresh token still good
    session.store_tokens(&expired_token(), &refresh_token).unwrap();
    assert!(session.status().needs_refresh());

    services.auth.ensure_fresh().await.unwrap();

    assert!(services.auth.is_authenticated());
    assert_ne!(session.refresh_token(), Some(refresh_token));
    assert_eq!(services.persons.get(1).await.unwrap().full_name, "Administrator");
}

#[tokio::test]
async fn test_persons_through_the_list_controller() {
    let Harness { services, .. } = logged_in().await;

    for n in 1..=12 {
        services
            .persons
            .create(&PersonInput::new(&format!("Client {:02}", n), None))
            .await
            .unwrap();
    }
    let company = services
        .persons
        .create_by_cnpj("11.444.777/0001-61")
        .await
        .unwrap();
    assert_eq!(company.cnpj(), Some("11444777000161"));

    // Same CNPJ again is a conflict on the server
    let duplicate = services.persons.create_by_cnpj("11444777000161").await;
    assert_eq!(duplicate, Err(ApiError::Status { status: 409 }));

    let mut list = ListController::new(
        services.persons.clone(),
        ListOptions {
            items_per_page: 5,
            prevent_duplicate_calls: true,
            ..ListOptions::default()
        },
    );

    assert_eq!(list.handle_search_change("client").await, LoadOutcome::Loaded);
    assert_eq!(list.pagination().total_items, 12);
    assert_eq!(list.pagination().total_pages, 3);

    assert_eq!(list.handle_page_change(3).await, LoadOutcome::Loaded);
    assert_eq!(list.data().len(), 2);
    assert_eq!(list.handle_page_change(3).await, LoadOutcome::Skipped);
}

#[tokio::test]
async fn test_movement_lifecycle() {
    let Harness { services, .. } = logged_in().await;

    let person = services
        .persons
        .create(&PersonInput::new("Padaria Central", None))
        .await
        .unwrap();
    let statuses = services.movement_statuses.list().await.unwrap();
    let pending = statuses.iter().find(|s| s.status_name == "Pending").unwrap();
    let types = services.movement_types.list().await.unwrap();

    let today = chrono::Local::now().date_naive();
    let input = MovementInput {
        movement_date: today,
        person_id: person.person_id,
        total_amount: 150.0,
        discount: 10.0,
        addition: 0.0,
        total_items: 160.0,
        description: Some("Bread".to_string()),
        movement_type_id: types[0].movement_type_id,
        movement_status_id: pending.movement_status_id,
        license_id: None,
        is_template: false,
    };
    let movement = services.movements.create(&input).await.unwrap();
    assert_eq!(movement.person_name, "Padaria Central");

    let source = MovementSource::new(
        services.movements.clone(),
        MovementFilter::default().period(Period::Today, today),
    );
    let mut list = ListController::new(source, ListOptions::default());
    assert_eq!(list.load(1, None).await, LoadOutcome::Loaded);
    assert_eq!(list.data().len(), 1);

    let cancelled = services
        .movements
        .cancel(movement.movement_id, "customer gave up")
        .await
        .unwrap();
    assert!(cancelled.is_cancelled());

    let metrics = services
        .movements
        .metrics(&MovementFilter::default())
        .await
        .unwrap();
    assert_eq!(metrics.count, 1);
    assert_eq!(metrics.by_status["Cancelled"].count, 1);

    // A type in use cannot go away
    let refused = services.movement_types.delete(types[0].movement_type_id).await;
    assert_eq!(refused, Err(ApiError::Status { status: 409 }));
}

#[tokio::test]
async fn test_health_endpoints() {
    let Harness { services, .. } = start().await;

    let health = services.health.system().await.unwrap();
    assert!(health.is_healthy());
    assert_eq!(health.version, finance_app::VERSION);

    let databases = services.health.databases().await.unwrap();
    assert_eq!(databases["Main DB"].database, "SQLite");
}
