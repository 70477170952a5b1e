use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{Method, Request, StatusCode};
use http_body_util::{BodyExt, Full};
use micro_rest::error::Rejection;
use micro_rest::params::{self, OptionalParam, Placement, Value};
use micro_rest::router::{Routes, delete, get, post};
use micro_rest::{Engine, HandlerResult, Middlewares, Reply, RequestContext, ServiceApi, handler_fn, middleware_fn};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

#[derive(Deserialize, Serialize, Clone, Debug)]
struct Note {
    title: String,
    #[serde(default)]
    tags: Vec<String>,
}

/// Notes by id; a deleted note leaves an empty slot so ids stay stable.
type Store = Arc<Mutex<Vec<Option<Note>>>>;

#[derive(Default)]
struct Notes {
    store: Store,
}

async fn create_note(ctx: &mut RequestContext) -> HandlerResult {
    let note = ctx.declared_body::<Note>()?.clone();
    let store = ctx.extensions().get::<Store>().ok_or("note store not attached")?;
    let id = {
        let mut notes = store.lock().map_err(|e| e.to_string())?;
        notes.push(Some(note));
        notes.len() - 1
    };
    Ok(Reply::object(StatusCode::CREATED, &serde_json::json!({ "id": id })))
}

async fn find_note(ctx: &mut RequestContext) -> HandlerResult {
    let id: i64 = ctx.declared(Placement::Path, "id")?;
    let verbose = ctx.boolean(Placement::Query, "verbose").await.optional()?.unwrap_or_default();

    let store = ctx.extensions().get::<Store>().ok_or("note store not attached")?;
    let notes = store.lock().map_err(|e| e.to_string())?;
    let Some(note) = usize::try_from(id).ok().and_then(|id| notes.get(id)).and_then(Option::as_ref) else {
        return Ok(Reply::not_found(format!("note {id} not found")));
    };

    if verbose { Ok(Reply::ok(note)) } else { Ok(Reply::ok(&note.title)) }
}

async fn delete_note(ctx: &mut RequestContext) -> HandlerResult {
    let id: i64 = ctx.declared(Placement::Path, "id")?;

    let store = ctx.extensions().get::<Store>().ok_or("note store not attached")?;
    let mut notes = store.lock().map_err(|e| e.to_string())?;
    let removed = usize::try_from(id).ok().and_then(|id| notes.get_mut(id)).and_then(Option::take);

    match removed {
        Some(_) => Ok(Reply::no_content()),
        None => Ok(Reply::not_found(format!("note {id} not found"))),
    }
}

async fn attach_store(ctx: &mut RequestContext) -> Result<(), Rejection> {
    if ctx.extensions().get::<Store>().is_none() {
        return Err(Rejection::internal_server_error("note store not attached"));
    }
    Ok(())
}

fn non_negative(value: &Value) -> Result<(), String> {
    match value {
        Value::Integer(id) if *id >= 0 => Ok(()),
        _ => Err("must not be negative".to_owned()),
    }
}

impl ServiceApi for Notes {
    fn prefix(&self) -> &str {
        "notes"
    }

    fn routes(&self) -> Routes {
        Routes::new()
            .route("", post(handler_fn(create_note)).with(params::body::<Note>()))
            .route("{id}", get(handler_fn(find_note)).with(params::integer(Placement::Path, "id").check(non_negative)))
            .route(
                "{id}",
                delete(handler_fn(delete_note))
                    .with(params::integer(Placement::Path, "id"))
                    .with(params::validate(Placement::Path, "id", non_negative)),
            )
    }

    fn middlewares(&self) -> Middlewares {
        Middlewares::new().add_last(middleware_fn(attach_store))
    }
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let notes = Notes::default();
    let store = Arc::clone(&notes.store);

    let engine = match Engine::builder().service(notes).build() {
        Ok(engine) => engine,
        Err(e) => {
            error!(cause = %e, "building engine failed");
            return;
        }
    };

    let requests = [
        (Method::POST, "/api/notes", Some(r#"{"title":"groceries","tags":["home"]}"#)),
        (Method::GET, "/api/notes/0?verbose=true", None),
        (Method::GET, "/api/notes/0", None),
        (Method::GET, "/api/notes/-1", None),
        (Method::GET, "/api/notes/abc", None),
        (Method::GET, "/api/notes/7", None),
        (Method::PUT, "/api/notes/0", None),
        (Method::POST, "/api/notes", Some("{}")),
        (Method::DELETE, "/api/notes/0", None),
        (Method::GET, "/api/notes/0", None),
        (Method::DELETE, "/api/notes/0", None),
        (Method::GET, "/api/todos", None),
    ];

    for (method, uri, body) in requests {
        let mut builder = Request::builder().method(method.clone()).uri(uri);
        if body.is_some() {
            builder = builder.header(CONTENT_TYPE, mime::APPLICATION_JSON.as_ref());
        }

        let body = body.map(|body| Bytes::from_static(body.as_bytes())).unwrap_or_default();
        let mut request = match builder.body(Full::new(body)) {
            Ok(request) => request,
            Err(e) => {
                error!(cause = %e, "invalid request");
                continue;
            }
        };
        request.extensions_mut().insert(Arc::clone(&store));

        let response = engine.dispatch(request).await;
        let status = response.status();
        let body = match response.into_body().collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => match e {},
        };
        info!(%method, uri, %status, body = %String::from_utf8_lossy(&body), "dispatched");
    }
}
