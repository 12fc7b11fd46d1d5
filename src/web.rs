use std::{collections::HashMap, convert::Infallible, net::SocketAddr, path::PathBuf};

use async_graphql_warp::{GraphQLBadRequest, GraphQLResponse};
use serde_json::{json, Value};
use tracing::{error, info};
use warp::{
    http::StatusCode,
    hyper::body::Bytes,
    reject::{InvalidQuery, MethodNotAllowed, PayloadTooLarge},
    reply::{self, Response},
    Filter, Rejection, Reply,
};

use crate::{
    analysis::AnalysisRecord,
    api::{health::SERVICE_NAME, Schema},
    database::{Criterion, Database},
    error::Error,
    filter::{self, FilterParams},
    query,
};

const MAX_BODY_BYTES: u64 = 1024 * 1024;

pub(crate) async fn serve(
    schema: Schema,
    database: Database,
    addr: SocketAddr,
    tls: Option<(PathBuf, PathBuf)>,
) {
    let routes = routes(schema, database);
    if let Some((cert, key)) = tls {
        info!("Listening on https://{addr}");
        warp::serve(routes)
            .tls()
            .cert_path(cert)
            .key_path(key)
            .run(addr)
            .await;
    } else {
        info!("Listening on http://{addr}");
        warp::serve(routes).run(addr).await;
    }
}

/// The GraphQL endpoint at `/graphql` and the REST endpoints under
/// `/strings` and `/health`.
pub(crate) fn routes(
    schema: Schema,
    database: Database,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let graphql = warp::path("graphql")
        .and(warp::path::end())
        .and(async_graphql_warp::graphql(schema))
        .and_then(
            |(schema, request): (Schema, async_graphql::Request)| async move {
                Ok::<_, Infallible>(GraphQLResponse::from(schema.execute(request).await))
            },
        );
    let db = warp::any().map(move || database.clone());

    let create = warp::path!("strings")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::bytes())
        .and(db.clone())
        .map(create_string);
    let list = warp::path!("strings")
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(db.clone())
        .map(list_strings);
    let natural_language = warp::path!("strings" / "filter-by-natural-language")
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(db.clone())
        .map(filter_by_natural_language);
    let get = warp::path!("strings" / String)
        .and(warp::get())
        .and(db.clone())
        .map(get_string);
    let delete = warp::path!("strings" / String)
        .and(warp::delete())
        .and(db.clone())
        .map(delete_string);
    let health = warp::path!("health")
        .and(warp::get())
        .and(db)
        .map(report_health);

    graphql
        .or(create)
        .or(list)
        .or(natural_language)
        .or(get)
        .or(delete)
        .or(health)
        .recover(handle_rejection)
        .with(warp::trace::request())
}

fn render(record: &AnalysisRecord) -> Value {
    json!({
        "id": record.content_hash,
        "value": record.value,
        "properties": {
            "length": record.length,
            "is_palindrome": record.is_palindrome,
            "unique_characters": record.unique_char_count,
            "word_count": record.word_count,
            "sha256_hash": record.content_hash,
            "character_frequency_map": record.character_frequency,
        },
        "created_at": record.created_at.to_rfc3339(),
    })
}

fn render_all(records: &[AnalysisRecord]) -> Value {
    Value::Array(records.iter().map(render).collect())
}

fn failure(status: StatusCode, error: &str, details: Option<&str>) -> Response {
    let mut body = json!({ "error": error, "status_code": status.as_u16() });
    if let Some(details) = details {
        body["details"] = Value::from(details);
    }
    reply::with_status(reply::json(&body), status).into_response()
}

fn error_response(e: &Error) -> Response {
    let message = e.to_string();
    match e {
        Error::InvalidQuery(_) => failure(
            StatusCode::BAD_REQUEST,
            "Unable to parse natural language query",
            Some(&message),
        ),
        Error::Validation(_) => failure(
            StatusCode::BAD_REQUEST,
            "Invalid query parameter values",
            Some(&message),
        ),
        Error::NotFound(_) => failure(StatusCode::NOT_FOUND, &message, None),
        Error::AlreadyExists(_) => failure(StatusCode::CONFLICT, &message, None),
        Error::Storage(_) | Error::Serialization(_) => {
            error!("Problem while accessing the database. {message}");
            failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                Some(&message),
            )
        }
    }
}

fn create_string(body: Bytes, db: Database) -> Response {
    let body: Value = match serde_json::from_slice(&body) {
        Ok(body) => body,
        Err(e) => {
            return failure(
                StatusCode::BAD_REQUEST,
                "Invalid JSON body",
                Some(&e.to_string()),
            )
        }
    };
    let value = match body.get("value") {
        Some(Value::String(value)) => value,
        Some(_) => {
            return failure(
                StatusCode::UNPROCESSABLE_ENTITY,
                "Value must be a string",
                None,
            )
        }
        None => return failure(StatusCode::BAD_REQUEST, "Missing 'value' field", None),
    };
    match db.insert(value) {
        Ok(record) => {
            reply::with_status(reply::json(&render(&record)), StatusCode::CREATED).into_response()
        }
        Err(e) => error_response(&e),
    }
}

fn list_strings(params: HashMap<String, String>, db: Database) -> Response {
    let result = FilterParams::from_raw(params.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .and_then(|params| {
            let predicate = filter::translate_structured(&params)?;
            Ok((params, db.find_many(&predicate)?))
        });
    match result {
        Ok((params, records)) => reply::json(&json!({
            "data": render_all(&records),
            "count": records.len(),
            "filters_applied": params,
        }))
        .into_response(),
        Err(e) => error_response(&e),
    }
}

fn filter_by_natural_language(params: HashMap<String, String>, db: Database) -> Response {
    let text = params.get("query").map_or("", |q| q.trim());
    if text.is_empty() {
        return failure(StatusCode::BAD_REQUEST, "Query parameter is required", None);
    }
    let result = query::translate_natural_language(text).and_then(|(predicate, interpreted)| {
        Ok((interpreted, db.find_many(&predicate)?))
    });
    match result {
        Ok((interpreted, records)) => reply::json(&json!({
            "data": render_all(&records),
            "count": records.len(),
            "interpreted_query": interpreted,
        }))
        .into_response(),
        Err(e) => error_response(&e),
    }
}

fn resolve(identifier: &str) -> Result<Criterion, Response> {
    urlencoding::decode(identifier)
        .map(|identifier| Criterion::from_identifier(&identifier))
        .map_err(|e| {
            failure(
                StatusCode::BAD_REQUEST,
                "Invalid identifier",
                Some(&e.to_string()),
            )
        })
}

fn get_string(identifier: String, db: Database) -> Response {
    let criterion = match resolve(&identifier) {
        Ok(criterion) => criterion,
        Err(response) => return response,
    };
    match db.find_one(&criterion) {
        Ok(record) => reply::json(&render(&record)).into_response(),
        Err(e) => error_response(&e),
    }
}

fn delete_string(identifier: String, db: Database) -> Response {
    let criterion = match resolve(&identifier) {
        Ok(criterion) => criterion,
        Err(response) => return response,
    };
    match db.delete(&criterion) {
        Ok(()) => reply::with_status(reply::reply(), StatusCode::NO_CONTENT).into_response(),
        Err(e) => error_response(&e),
    }
}

fn report_health(db: Database) -> Response {
    reply::json(&json!({
        "status": "healthy",
        "total_analyses": db.count(),
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
    }))
    .into_response()
}

#[allow(clippy::unused_async)]
async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    if let Some(GraphQLBadRequest(e)) = err.find::<GraphQLBadRequest>() {
        return Ok(failure(
            StatusCode::BAD_REQUEST,
            "Invalid GraphQL request",
            Some(&e.to_string()),
        ));
    }
    let status = if err.find::<InvalidQuery>().is_some() {
        StatusCode::BAD_REQUEST
    } else if err.find::<PayloadTooLarge>().is_some() {
        StatusCode::PAYLOAD_TOO_LARGE
    } else if err.find::<MethodNotAllowed>().is_some() {
        StatusCode::METHOD_NOT_ALLOWED
    } else if err.is_not_found() {
        StatusCode::NOT_FOUND
    } else {
        error!("Unhandled rejection: {err:?}");
        StatusCode::INTERNAL_SERVER_ERROR
    };
    Ok(failure(
        status,
        status.canonical_reason().unwrap_or("Request failed"),
        None,
    ))
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};
    use warp::http::StatusCode;

    use super::routes;
    use crate::{analysis::content_hash, api, database::Database};

    fn setup() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::connect(dir.path()).unwrap();
        (dir, db)
    }

    fn body(res: &warp::http::Response<warp::hyper::body::Bytes>) -> Value {
        serde_json::from_slice(res.body()).unwrap()
    }

    #[tokio::test]
    async fn create_then_get_by_value_and_hash() {
        let (_dir, db) = setup();
        let filter = routes(api::schema(db.clone()), db);

        let res = warp::test::request()
            .method("POST")
            .path("/strings")
            .body(r#"{"value": "hello world"}"#)
            .reply(&filter)
            .await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let created = body(&res);
        let hash = content_hash("hello world");
        assert_eq!(created["id"], json!(hash));
        assert_eq!(created["properties"]["length"], json!(11));
        assert_eq!(created["properties"]["word_count"], json!(2));
        assert_eq!(created["properties"]["is_palindrome"], json!(false));
        assert_eq!(created["properties"]["character_frequency_map"]["l"], json!(3));

        let res = warp::test::request()
            .path("/strings/hello%20world")
            .reply(&filter)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body(&res)["value"], json!("hello world"));

        let res = warp::test::request()
            .path(&format!("/strings/{hash}"))
            .reply(&filter)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body(&res)["value"], json!("hello world"));
    }

    #[tokio::test]
    async fn create_rejects_bad_bodies() {
        let (_dir, db) = setup();
        let filter = routes(api::schema(db.clone()), db);

        let res = warp::test::request()
            .method("POST")
            .path("/strings")
            .body(r#"{"other": 1}"#)
            .reply(&filter)
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body(&res)["error"], json!("Missing 'value' field"));

        let res = warp::test::request()
            .method("POST")
            .path("/strings")
            .body(r#"{"value": 42}"#)
            .reply(&filter)
            .await;
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let res = warp::test::request()
            .method("POST")
            .path("/strings")
            .body("not json")
            .reply(&filter)
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn create_duplicate_conflicts() {
        let (_dir, db) = setup();
        db.insert("hello").unwrap();
        let filter = routes(api::schema(db.clone()), db);

        let res = warp::test::request()
            .method("POST")
            .path("/strings")
            .body(r#"{"value": "hello"}"#)
            .reply(&filter)
            .await;
        assert_eq!(res.status(), StatusCode::CONFLICT);
        assert_eq!(
            body(&res),
            json!({"error": "String already exists", "status_code": 409})
        );
    }

    #[tokio::test]
    async fn list_with_filters() {
        let (_dir, db) = setup();
        for value in ["level", "hello world", "noon", "a"] {
            db.insert(value).unwrap();
        }
        let filter = routes(api::schema(db.clone()), db);

        let res = warp::test::request()
            .path("/strings?is_palindrome=true&min_length=4")
            .reply(&filter)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        let listed = body(&res);
        assert_eq!(listed["count"], json!(2));
        assert_eq!(listed["data"][0]["value"], json!("noon"));
        assert_eq!(listed["data"][1]["value"], json!("level"));
        assert_eq!(
            listed["filters_applied"],
            json!({"is_palindrome": true, "min_length": 4})
        );

        let res = warp::test::request()
            .path("/strings?contains_character=ab")
            .reply(&filter)
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body(&res)["details"],
            json!("contains_character must be a single character")
        );
    }

    #[tokio::test]
    async fn natural_language_query() {
        let (_dir, db) = setup();
        for value in ["level", "hello world", "noon", "kayak"] {
            db.insert(value).unwrap();
        }
        let filter = routes(api::schema(db.clone()), db);

        let res = warp::test::request()
            .path("/strings/filter-by-natural-language?query=palindromes%20containing%20the%20letter%20k")
            .reply(&filter)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        let found = body(&res);
        assert_eq!(found["count"], json!(1));
        assert_eq!(found["data"][0]["value"], json!("kayak"));
        assert_eq!(
            found["interpreted_query"],
            json!({
                "original": "palindromes containing the letter k",
                "parsed_filters": {"is_palindrome": true, "contains_character": "k"},
            })
        );

        let res = warp::test::request()
            .path("/strings/filter-by-natural-language?query=%20%20")
            .reply(&filter)
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body(&res)["error"], json!("Query parameter is required"));
    }

    #[tokio::test]
    async fn delete_then_not_found() {
        let (_dir, db) = setup();
        db.insert("noon").unwrap();
        let filter = routes(api::schema(db.clone()), db);

        let res = warp::test::request()
            .method("DELETE")
            .path("/strings/noon")
            .reply(&filter)
            .await;
        assert_eq!(res.status(), StatusCode::NO_CONTENT);

        let res = warp::test::request()
            .method("DELETE")
            .path("/strings/noon")
            .reply(&filter)
            .await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(body(&res)["error"], json!("String analysis not found"));
    }

    #[tokio::test]
    async fn health_and_graphql() {
        let (_dir, db) = setup();
        db.insert("hello").unwrap();
        let filter = routes(api::schema(db.clone()), db);

        let res = warp::test::request().path("/health").reply(&filter).await;
        assert_eq!(res.status(), StatusCode::OK);
        let health = body(&res);
        assert_eq!(health["status"], json!("healthy"));
        assert_eq!(health["total_analyses"], json!(1));

        let res = warp::test::request()
            .method("POST")
            .path("/graphql")
            .header("content-type", "application/json")
            .body(r#"{"query": "{ health { totalAnalyses } }"}"#)
            .reply(&filter)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            body(&res)["data"],
            json!({"health": {"totalAnalyses": 1}})
        );
    }

    #[tokio::test]
    async fn unknown_path() {
        let (_dir, db) = setup();
        let filter = routes(api::schema(db.clone()), db);
        let res = warp::test::request().path("/nowhere").reply(&filter).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
