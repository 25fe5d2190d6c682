use std::any::Any;

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{Path, State, rejection::PathRejection},
    response::{IntoResponse, Response},
    routing::get,
};
use cep_weather_core::{LookupError, MergedResult, Orchestrator, RequestScope, WeatherRecord};
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::{error, info, warn};

/// Lookup error rendered as the JSON error body with a matching status.
#[derive(Debug)]
pub struct ApiError(LookupError);

impl From<LookupError> for ApiError {
    fn from(err: LookupError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0.status(), Json(self.0)).into_response()
    }
}

pub fn router(orchestrator: Orchestrator) -> Router {
    Router::new()
        .route("/weatherByCep/{cep}", get(weather_by_cep))
        .route("/weatherByCep", get(missing_cep))
        .route("/weatherByCep/", get(missing_cep))
        .route("/weather/{city}", get(weather_by_city))
        .fallback(unknown_route)
        .with_state(orchestrator)
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(handle_panic))
}

pub async fn run(orchestrator: Orchestrator, port: u16) -> Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("Web server running at http://localhost:{port}");
    axum::serve(listener, router(orchestrator))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Web server failed")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "unable to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

async fn weather_by_cep(
    State(orchestrator): State<Orchestrator>,
    cep: Result<Path<String>, PathRejection>,
) -> Result<Json<MergedResult>, ApiError> {
    let Path(cep) = cep.map_err(|err| LookupError::bad_request(err.body_text()))?;

    // Dropping the handler (client went away) cancels the in-flight stage.
    let request = RequestScope::new();
    let _cancel = request.cancel_on_drop();

    Ok(Json(orchestrator.lookup(&request, &cep).await?))
}

async fn weather_by_city(
    State(orchestrator): State<Orchestrator>,
    city: Result<Path<String>, PathRejection>,
) -> Result<Json<WeatherRecord>, ApiError> {
    let Path(city) = city.map_err(|err| LookupError::bad_request(err.body_text()))?;

    let request = RequestScope::new();
    let _cancel = request.cancel_on_drop();

    Ok(Json(orchestrator.weather_for_city(&request, &city).await?))
}

async fn missing_cep() -> ApiError {
    LookupError::bad_request("CEP not sent in parameter. Example: /weatherByCep/{cep}").into()
}

async fn unknown_route() -> ApiError {
    LookupError::not_found("Access must go through the endpoint /weatherByCep/{cep}").into()
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(detail, "request handler panicked");

    ApiError(LookupError::internal("Internal server error")).into_response()
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use cep_weather_core::Config;
    use http_body_util::BodyExt;
    use tower::ServiceExt;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path, query_param},
    };

    use super::*;

    async fn upstreams() -> MockServer {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/ws/01001000/json/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "cep": "01001-000",
                "logradouro": "Praça da Sé",
                "bairro": "Sé",
                "localidade": "São Paulo",
                "uf": "SP"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/ws/99999999/json/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"erro": true})))
            .mount(&server)
            .await;
        // wiremock decodes the query, so `Sao%20Paulo` arrives as `Sao Paulo`.
        Mock::given(method("GET"))
            .and(path("/v1/current.json"))
            .and(query_param("q", "Sao Paulo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "location": {"name": "Sao Paulo", "country": "Brazil"},
                "current": {"temp_c": 25.0, "temp_f": 77.0, "condition": {"text": "Sunny"}}
            })))
            .mount(&server)
            .await;

        server
    }

    fn app(server: &MockServer) -> Router {
        let mut cfg = Config::default();
        cfg.upstream.location_url = format!("{}/ws/{{cep}}/json/", server.uri());
        cfg.upstream.weather_url = format!("{}/v1/current.json?key=", server.uri());
        cfg.set_weather_api_key("KEY".into());

        router(Orchestrator::from_config(&cfg).unwrap())
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let res = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = res.status();
        assert_eq!(res.headers()["content-type"], "application/json");
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_weather_by_cep_returns_merged_record() {
        let server = upstreams().await;

        let (status, body) = get_json(app(&server), "/weatherByCep/01001-000").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["localidade"], "São Paulo");
        assert_eq!(body["bairro"], "Sé");
        assert_eq!(body["temp_c"], 25.0);
        assert_eq!(body["temp_f"], 77.0);
        assert_eq!(body["temp_k"], 298.0);
    }

    #[tokio::test]
    async fn test_invalid_codes_return_json_errors() {
        let server = upstreams().await;

        let (status, body) = get_json(app(&server), "/weatherByCep/1234567").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], 422);

        let (status, body) = get_json(app(&server), "/weatherByCep/abc").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], 400);
        assert!(body["message"].as_str().unwrap().contains("zipcode"));
    }

    #[tokio::test]
    async fn test_unknown_code_is_not_found() {
        let server = upstreams().await;

        let (status, body) = get_json(app(&server), "/weatherByCep/99999-999").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], 404);
    }

    #[tokio::test]
    async fn test_missing_cep_and_unknown_route() {
        let server = upstreams().await;

        let (status, body) = get_json(app(&server), "/weatherByCep").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], 400);

        let (status, body) = get_json(app(&server), "/somewhere/else").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["message"].as_str().unwrap().contains("/weatherByCep"));
    }

    #[tokio::test]
    async fn test_weather_by_city_decodes_path() {
        let server = upstreams().await;

        let (status, body) = get_json(app(&server), "/weather/S%C3%A3o%20Paulo").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({"temp_c": 25.0, "temp_f": 77.0, "temp_k": 298.0}));
    }

    #[test]
    fn error_status_follows_lookup_code() {
        let res = ApiError(LookupError::timeout("Search time exceeded.")).into_response();
        assert_eq!(res.status(), StatusCode::REQUEST_TIMEOUT);

        let res = ApiError(LookupError { message: "odd".into(), code: 42 }).into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn panics_become_internal_errors() {
        let res = handle_panic(Box::new("boom"));
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
