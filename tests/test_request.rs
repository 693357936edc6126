use gantry::http::request::{Method, Request};
use std::collections::HashMap;

fn request_with(headers: &[(&str, &str)], target: &str) -> Request {
    let headers: HashMap<String, String> = headers
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Request::new(Method::GET, target, "HTTP/1.1", headers)
}

#[test]
fn test_request_header_retrieval() {
    let req = request_with(&[("Host", "example.com"), ("Content-Type", "application/json")], "/");

    assert_eq!(req.header("Host"), Some("example.com"));
    assert_eq!(req.header("Content-Type"), Some("application/json"));
    assert_eq!(req.header("Missing"), None);
}

#[test]
fn test_request_header_case_insensitive_fallback() {
    let req = request_with(&[("content-length", "7")], "/");

    assert_eq!(req.header("Content-Length"), Some("7"));
    assert_eq!(req.content_length(), 7);
}

#[test]
fn test_request_content_length_parsing() {
    let req = request_with(&[("Content-Length", "42")], "/api");
    assert_eq!(req.content_length(), 42);
}

#[test]
fn test_request_content_length_missing_is_unknown() {
    let req = request_with(&[], "/");
    assert_eq!(req.content_length(), -1);
}

#[test]
fn test_request_content_length_invalid_is_unknown() {
    let req = request_with(&[("Content-Length", "not-a-number")], "/api");
    assert_eq!(req.content_length(), -1);

    let req = request_with(&[("Content-Length", "-12")], "/api");
    assert_eq!(req.content_length(), -1);
}

#[test]
fn test_request_content_length_zero() {
    let req = request_with(&[("Content-Length", "0")], "/api");
    assert_eq!(req.content_length(), 0);
}

#[test]
fn test_request_path_strips_query() {
    let req = request_with(&[], "/search?q=rust&page=2");

    assert_eq!(req.path(), "/search");
    assert_eq!(req.query_string(), Some("q=rust&page=2"));
    assert_eq!(req.target, "/search?q=rust&page=2");
}

#[test]
fn test_request_without_query() {
    let req = request_with(&[], "/plain");

    assert_eq!(req.path(), "/plain");
    assert_eq!(req.query_string(), None);
    assert!(req.query().is_empty());
}

#[test]
fn test_request_query_values_are_decoded() {
    let req = request_with(&[], "/s?q=hello+world&path=%2Ftmp%2Fx&empty=");

    assert_eq!(req.query_param("q"), Some("hello world"));
    assert_eq!(req.query_param("path"), Some("/tmp/x"));
    assert_eq!(req.query_param("empty"), Some(""));
    assert_eq!(req.query_param("missing"), None);
}

#[test]
fn test_request_content_type() {
    let req = request_with(&[("Content-Type", "text/plain")], "/");
    assert_eq!(req.content_type(), Some("text/plain"));
}

#[test]
fn test_method_round_trip_names() {
    let names = [
        "GET", "POST", "PUT", "PATCH", "HEAD", "DELETE", "CONNECT", "OPTIONS", "TRACE",
    ];
    for name in names {
        let method = Method::from_str(name).unwrap();
        assert_eq!(method.as_str(), name);
        assert_eq!(method.to_string(), name);
    }
}

#[test]
fn test_method_rejects_unknown_and_lowercase() {
    assert_eq!(Method::from_str("BREW"), None);
    assert_eq!(Method::from_str("get"), None);
    assert_eq!(Method::from_str(""), None);
}
