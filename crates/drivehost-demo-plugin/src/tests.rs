//! Unit tests for the demo plugin.

use std::collections::HashMap;
use std::io::Cursor;

use drivehost_plugins::codec::{self, decode_payload};
use drivehost_plugins::model::{Link, Object, Storage};
use drivehost_plugins::protocol::{decode_bytes, method};
use rstest::{fixture, rstest};
use serde_json::{Map, Value, json};

use super::*;

fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let env: HashMap<String, String> = pairs
        .iter()
        .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
        .collect();
    move |key| env.get(key).cloned()
}

fn request(id: i64, name: &str, params: Value) -> JsonRpcRequest {
    JsonRpcRequest::new(id, name, Some(params))
}

fn result_of(response: JsonRpcResponse) -> Value {
    assert!(response.error.is_none(), "unexpected error: {response:?}");
    response.result.unwrap_or(Value::Null)
}

fn error_code(response: &JsonRpcResponse) -> i64 {
    response.error.as_ref().map(|error| error.code).expect("error response")
}

fn decoded<T: serde::de::DeserializeOwned>(result: &Value) -> T {
    let text = result.as_str().expect("base64 payload");
    decode_payload(&decode_bytes(text).expect("base64")).expect("payload")
}

fn object_params(key: &str, path: &str) -> Value {
    let object = codec::encode(&Object {
        path: path.to_owned(),
        ..Object::default()
    })
    .expect("encode object");
    let mut params = Map::new();
    params.insert(String::from("driver_name"), json!(DRIVER_NAME));
    params.insert(key.to_owned(), object.into_value());
    params.insert(String::from("args_data"), json!({}));
    Value::Object(params)
}

#[fixture]
fn initialised() -> Dispatcher {
    let mut dispatcher = Dispatcher::new(DemoTree::sample());
    let storage = codec::encode(&Storage {
        mount_path: String::from("/demo"),
        driver: String::from(DRIVER_NAME),
        ..Storage::default()
    })
    .expect("encode storage");
    let response = dispatcher.respond(&request(
        1,
        method::INIT_DRIVER,
        json!({"driver_name": DRIVER_NAME, "storage_data": storage}),
    ));
    assert_eq!(result_of(response), Value::Null);
    dispatcher
}

#[rstest]
fn refuses_to_run_without_cookie() {
    let error = announcement_from(lookup_from(&[])).expect_err("no cookie");
    assert!(matches!(error, ServeError::NotLaunchedByHost));
}

#[rstest]
#[case::default(None, PROTOCOL_VERSION)]
#[case::override_version(Some("7"), 7)]
fn announces_protocol_version(#[case] version: Option<&str>, #[case] expected: u32) {
    let mut pairs = vec![(DEFAULT_MAGIC_COOKIE_KEY, DEFAULT_MAGIC_COOKIE_VALUE)];
    if let Some(value) = version {
        pairs.push((PROTOCOL_VERSION_OVERRIDE_ENV, value));
    }
    let announcement = announcement_from(lookup_from(&pairs)).expect("announcement");
    assert_eq!(announcement.protocol_version, expected);
    assert_eq!(announcement.magic_cookie_value, DEFAULT_MAGIC_COOKIE_VALUE);
}

#[rstest]
fn rejects_malformed_version_override() {
    let lookup = lookup_from(&[
        (DEFAULT_MAGIC_COOKIE_KEY, DEFAULT_MAGIC_COOKIE_VALUE),
        (PROTOCOL_VERSION_OVERRIDE_ENV, "one"),
    ]);
    let error = announcement_from(lookup).expect_err("bad override");
    assert!(error.to_string().contains("'one'"), "got {error}");
}

#[rstest]
fn reports_identity_and_drivers() {
    let mut dispatcher = Dispatcher::new(DemoTree::sample());
    let info = result_of(dispatcher.respond(&JsonRpcRequest::new(1, method::GET_INFO, None)));
    let drivers =
        result_of(dispatcher.respond(&JsonRpcRequest::new(2, method::GET_DRIVERS, None)));

    assert_eq!(info["name"], json!(PLUGIN_NAME));
    assert_eq!(drivers, json!([DRIVER_NAME]));
}

#[rstest]
fn declares_driver_config() {
    let mut dispatcher = Dispatcher::new(DemoTree::sample());
    let config = result_of(dispatcher.respond(&request(
        1,
        method::GET_DRIVER_CONFIG,
        json!({"driver_name": DRIVER_NAME}),
    )));
    assert_eq!(config["local_sort"], json!(true));
    assert_eq!(config["default_root"], json!("/"));
}

#[rstest]
fn listing_requires_initialisation() {
    let mut dispatcher = Dispatcher::new(DemoTree::sample());
    let response = dispatcher.respond(&request(1, method::LIST, object_params("dir_data", "/")));
    assert_eq!(error_code(&response), DRIVER_FAILURE);
}

#[rstest]
#[case::root("/", &["docs", "empty", "hello.txt"])]
#[case::nested("/docs/", &["guide.md", "readme.txt"])]
#[case::empty("/empty", &[])]
fn lists_folders(
    mut initialised: Dispatcher,
    #[case] path: &str,
    #[case] expected: &[&str],
) {
    let result = result_of(initialised.respond(&request(
        2,
        method::LIST,
        object_params("dir_data", path),
    )));
    let children: Vec<Object> = decoded(&result);
    let names: Vec<&str> = children.iter().map(|child| child.name.as_str()).collect();
    assert_eq!(names, expected);
}

#[rstest]
fn missing_folder_is_a_driver_failure(mut initialised: Dispatcher) {
    let response = initialised.respond(&request(
        2,
        method::LIST,
        object_params("dir_data", "/nowhere"),
    ));
    assert_eq!(error_code(&response), DRIVER_FAILURE);
}

#[rstest]
fn links_files_under_the_mount_path(mut initialised: Dispatcher) {
    let result = result_of(initialised.respond(&request(
        2,
        method::LINK,
        object_params("file_data", "/docs/readme.txt"),
    )));
    let link: Link = decoded(&result);
    assert_eq!(link.url, "demo:///demo/docs/readme.txt");
    assert_eq!(link.expiration_secs, Some(300));
}

#[rstest]
fn folders_cannot_be_linked(mut initialised: Dispatcher) {
    let response = initialised.respond(&request(
        2,
        method::LINK,
        object_params("file_data", "/docs"),
    ));
    assert_eq!(error_code(&response), DRIVER_FAILURE);
}

#[rstest]
fn drop_forgets_the_storage(mut initialised: Dispatcher) {
    let dropped = initialised.respond(&request(
        2,
        method::DROP_DRIVER,
        json!({"driver_name": DRIVER_NAME}),
    ));
    assert_eq!(result_of(dropped), Value::Null);

    let response = initialised.respond(&request(3, method::LIST, object_params("dir_data", "/")));
    assert_eq!(error_code(&response), DRIVER_FAILURE);
}

#[rstest]
#[case::unknown_method(
    JsonRpcRequest::new(1, "Plugin.Upload", None),
    JsonRpcError::METHOD_NOT_FOUND
)]
#[case::unknown_driver(
    JsonRpcRequest::new(1, method::DROP_DRIVER, Some(json!({"driver_name": "Other"}))),
    DRIVER_FAILURE
)]
#[case::missing_params(
    JsonRpcRequest::new(1, method::INIT_DRIVER, None),
    JsonRpcError::INVALID_PARAMS
)]
fn rejects_bad_requests(#[case] bad: JsonRpcRequest, #[case] code: i64) {
    let mut dispatcher = Dispatcher::new(DemoTree::sample());
    assert_eq!(error_code(&dispatcher.respond(&bad)), code);
}

#[rstest]
fn serve_announces_then_answers_each_frame() {
    let mut input = Vec::new();
    {
        let mut frames = FrameWriter::new(&mut input);
        let get_info = serde_json::to_vec(&JsonRpcRequest::new(1, method::GET_INFO, None))
            .expect("encode request");
        frames.write_frame(&get_info).expect("frame");
        frames.write_frame(b"not json").expect("frame");
    }
    let lookup = lookup_from(&[(DEFAULT_MAGIC_COOKIE_KEY, DEFAULT_MAGIC_COOKIE_VALUE)]);
    let announcement = announcement_from(lookup).expect("announcement");
    let mut output = Vec::new();

    serve(
        Cursor::new(input),
        &mut output,
        &announcement,
        Dispatcher::new(DemoTree::sample()),
    )
    .expect("serve");

    let mut frames = FrameReader::new(Cursor::new(output));
    let first = frames.read_frame().expect("read").expect("handshake frame");
    let handshake: HandshakeAnnouncement = serde_json::from_slice(&first).expect("handshake");
    assert_eq!(handshake, announcement);

    let second = frames.read_frame().expect("read").expect("info frame");
    let info: JsonRpcResponse = serde_json::from_slice(&second).expect("response");
    assert_eq!(info.id, Some(1));

    let third = frames.read_frame().expect("read").expect("parse error frame");
    let parse_error: JsonRpcResponse = serde_json::from_slice(&third).expect("response");
    assert_eq!(error_code(&parse_error), JsonRpcError::PARSE_ERROR);
    assert!(frames.read_frame().expect("read").is_none());
}
