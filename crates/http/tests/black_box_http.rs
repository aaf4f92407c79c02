use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::{Request, State};
use axum::middleware::{Next, from_fn_with_state};
use axum::response::Response;
use axum::routing::get;
use glue_auth::{InMemorySession, InMemoryUserDirectory, Session};
use glue_core::Permission;
use glue_http::{
    AuthenticateState, AuthorizeState, CurrentPermissions, CurrentUser, RedirectIfAuthenticated,
    SavePermissionsState, SessionHandle, authenticate, authorize, logout_routes,
    redirect_if_authenticated, save_permissions_in_context, serve,
};
use reqwest::StatusCode;
use reqwest::header::LOCATION;
use serde_json::json;
use tokio::sync::oneshot;

const SESSION_HEADER: &str = "x-test-session";

/// Stand-in for a cookie-backed session layer: the header names a session.
#[derive(Clone, Default)]
struct Sessions {
    by_id: Arc<Mutex<HashMap<String, Arc<InMemorySession>>>>,
}

impl Sessions {
    fn insert(&self, id: &str, session: InMemorySession) -> Arc<InMemorySession> {
        let session = Arc::new(session);
        self.by_id
            .lock()
            .unwrap()
            .insert(id.to_string(), session.clone());
        session
    }
}

async fn attach_session(State(sessions): State<Sessions>, mut req: Request, next: Next) -> Response {
    let session = req
        .headers()
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|id| sessions.by_id.lock().unwrap().get(id).cloned());
    if let Some(session) = session {
        let session: Arc<dyn Session> = session;
        req.extensions_mut().insert(SessionHandle::new(session));
    }
    next.run(req).await
}

struct TestServer {
    base_url: String,
    stop: Option<oneshot::Sender<()>>,
    handle: tokio::task::JoinHandle<std::io::Result<()>>,
}

impl TestServer {
    async fn spawn(users: Arc<InMemoryUserDirectory>, sessions: Sessions) -> Self {
        let app = Router::new()
            .route(
                "/protected",
                get(|CurrentPermissions(perms): CurrentPermissions| async move {
                    axum::Json(json!({ "permissions": perms }))
                })
                .route_layer(from_fn_with_state(
                    AuthorizeState::new(users.clone(), ["read", "write"]),
                    authorize,
                )),
            )
            .route(
                "/login",
                get(|| async { "login page" }).route_layer(from_fn_with_state(
                    RedirectIfAuthenticated::new("/home"),
                    redirect_if_authenticated,
                )),
            )
            .route(
                "/whoami",
                get(|CurrentUser(user): CurrentUser| async move {
                    axum::Json(json!({ "user_id": user }))
                }),
            )
            .merge(logout_routes())
            .layer(from_fn_with_state(
                SavePermissionsState::new(users.clone()),
                save_permissions_in_context,
            ))
            .layer(from_fn_with_state(AuthenticateState::new(users), authenticate))
            .layer(from_fn_with_state(sessions, attach_session));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let (stop, stopped) = oneshot::channel::<()>();

        let handle = tokio::spawn(serve(
            listener,
            app,
            async move {
                let _ = stopped.await;
            },
            Duration::from_secs(5),
        ));

        Self {
            base_url: format!("http://{addr}"),
            stop: Some(stop),
            handle,
        }
    }

    async fn shutdown(mut self) -> std::io::Result<()> {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        (&mut self.handle).await.unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

fn directory() -> Arc<InMemoryUserDirectory> {
    let users = InMemoryUserDirectory::new();
    users.upsert(
        "u_admin",
        true,
        vec![Permission::new("read"), Permission::new("write")],
    );
    users.upsert("u_reader", true, vec![Permission::new("read")]);
    users.upsert("u_gone", false, vec![Permission::new("read")]);
    Arc::new(users)
}

#[tokio::test]
async fn anonymous_request_is_sent_to_login() {
    let srv = TestServer::spawn(directory(), Sessions::default()).await;

    let res = client()
        .get(format!("{}/protected", srv.base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(res.headers()[LOCATION], "/login?redirect=%2Fprotected");
}

#[tokio::test]
async fn permitted_user_sees_loaded_permissions() {
    let sessions = Sessions::default();
    sessions.insert("s1", InMemorySession::with_user("u_admin"));
    let srv = TestServer::spawn(directory(), sessions).await;

    let res = client()
        .get(format!("{}/protected", srv.base_url))
        .header(SESSION_HEADER, "s1")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["permissions"], json!(["read", "write"]));
}

#[tokio::test]
async fn user_missing_a_permission_is_forbidden() {
    let sessions = Sessions::default();
    sessions.insert("s1", InMemorySession::with_user("u_reader"));
    let srv = TestServer::spawn(directory(), sessions).await;

    let res = client()
        .get(format!("{}/protected", srv.base_url))
        .header(SESSION_HEADER, "s1")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn inactive_user_is_logged_out_and_treated_as_anonymous() {
    let sessions = Sessions::default();
    let session = sessions.insert("s1", InMemorySession::with_user("u_gone"));
    let srv = TestServer::spawn(directory(), sessions).await;

    let res = client()
        .get(format!("{}/whoami", srv.base_url))
        .header(SESSION_HEADER, "s1")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["user_id"], serde_json::Value::Null);
    assert!(session.is_destroyed());
}

#[tokio::test]
async fn logged_in_user_is_kept_off_the_login_page() {
    let sessions = Sessions::default();
    sessions.insert("s1", InMemorySession::with_user("u_reader"));
    let srv = TestServer::spawn(directory(), sessions).await;
    let client = client();

    let res = client
        .get(format!("{}/login", srv.base_url))
        .header(SESSION_HEADER, "s1")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(res.headers()[LOCATION], "/home");

    let res = client
        .get(format!("{}/login", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn logout_ends_the_session() {
    let sessions = Sessions::default();
    let session = sessions.insert("s1", InMemorySession::with_user("u_admin"));
    let srv = TestServer::spawn(directory(), sessions).await;
    let client = client();

    let res = client
        .post(format!("{}/logout?redirect=/bye", srv.base_url))
        .header(SESSION_HEADER, "s1")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FOUND);
    assert_eq!(res.headers()[LOCATION], "/bye");
    assert!(session.is_destroyed());

    let res = client
        .get(format!("{}/whoami", srv.base_url))
        .header(SESSION_HEADER, "s1")
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["user_id"], serde_json::Value::Null);
}

#[tokio::test]
async fn server_shuts_down_gracefully() {
    let srv = TestServer::spawn(directory(), Sessions::default()).await;

    let res = client()
        .get(format!("{}/whoami", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    srv.shutdown().await.unwrap();
}
