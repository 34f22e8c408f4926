//! Application router configuration with protected and unprotected route definitions.

use axum::{
    Router,
    extract::{MatchedPath, Request},
    http::{HeaderName, HeaderValue, Method, header},
    middleware,
    routing::{get, post},
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::{
    AppState, Error,
    auth::{get_current_user_endpoint, log_in_endpoint, register_endpoint},
    budget::{
        create_budget_endpoint, delete_budget_endpoint, get_budget_endpoint,
        list_budgets_endpoint, update_budget_endpoint,
    },
    category::{
        create_category_endpoint, delete_category_endpoint, get_category_endpoint,
        list_categories_endpoint, update_category_endpoint,
    },
    circuit_breaker::circuit_breaker_middleware,
    endpoints,
    health::get_health,
    logging::logging_middleware,
    problem_details::{REQUEST_ID_HEADER, handle_panic, problem_details_middleware},
    report::{get_category_spending_endpoint, get_summary_endpoint, get_trend_endpoint},
    transaction::{
        create_transaction_endpoint, delete_transaction_endpoint, get_transaction_endpoint,
        list_transactions_endpoint, update_transaction_endpoint,
    },
};

/// Return a router with all the app's routes.
///
/// `cors_origin` is the origin allowed to call the API from a browser, or
/// `None` to allow any origin.
pub fn build_router(state: AppState, cors_origin: Option<HeaderValue>) -> Router {
    let auth_routes = Router::new()
        .route(endpoints::REGISTER, post(register_endpoint))
        .route(endpoints::LOG_IN, post(log_in_endpoint))
        .route_layer(state.auth_rate_limiter.layer());

    // Handlers on these routes take an `AuthenticatedUser`, which rejects
    // requests without a valid bearer token.
    let protected_routes = Router::new()
        .route(endpoints::CURRENT_USER, get(get_current_user_endpoint))
        .route(
            endpoints::CATEGORIES,
            get(list_categories_endpoint).post(create_category_endpoint),
        )
        .route(
            endpoints::CATEGORY,
            get(get_category_endpoint)
                .put(update_category_endpoint)
                .delete(delete_category_endpoint),
        )
        .route(
            endpoints::TRANSACTIONS,
            get(list_transactions_endpoint).post(create_transaction_endpoint),
        )
        .route(endpoints::TRANSACTION_SUMMARY, get(get_summary_endpoint))
        .route(endpoints::TRANSACTION_TREND, get(get_trend_endpoint))
        .route(
            endpoints::CATEGORY_SPENDING,
            get(get_category_spending_endpoint),
        )
        .route(
            endpoints::TRANSACTION,
            get(get_transaction_endpoint)
                .put(update_transaction_endpoint)
                .delete(delete_transaction_endpoint),
        )
        .route(
            endpoints::BUDGETS,
            get(list_budgets_endpoint).post(create_budget_endpoint),
        )
        .route(
            endpoints::BUDGET,
            get(get_budget_endpoint)
                .put(update_budget_endpoint)
                .delete(delete_budget_endpoint),
        );

    let request_id_header = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        .route(endpoints::HEALTH, get(get_health))
        .merge(auth_routes)
        .merge(protected_routes)
        .route_layer(middleware::from_fn_with_state(
            state.circuit_breakers.clone(),
            circuit_breaker_middleware,
        ))
        .fallback(|| async { Error::NotFound })
        .with_state(state)
        .layer(middleware::from_fn(logging_middleware))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(middleware::from_fn(problem_details_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors_layer(cors_origin))
}

fn make_request_span(request: &Request) -> tracing::Span {
    let method = request.method();
    let uri = request.uri();
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched_path| matched_path.as_str());
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    tracing::debug_span!("request", %method, %uri, matched_path, request_id)
}

fn cors_layer(origin: Option<HeaderValue>) -> CorsLayer {
    let allow_origin = match origin {
        Some(origin) => AllowOrigin::exact(origin),
        None => AllowOrigin::from(Any),
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .expose_headers([
            HeaderName::from_static(REQUEST_ID_HEADER),
            header::RETRY_AFTER,
        ])
}
