//! Request command handler
//!
//! Sends an arbitrary method and path through the same pipeline the tools
//! use: credentials, timeout, retries and error classification.

use crate::cli::{OutputFormat, RequestArgs};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::logging::timing::Timer;
use crate::output::OutputWriter;
use ovhgate_core::http::Method;
use ovhgate_core::{BearerPassthrough, OvhClient, RequestOptions};
use serde_json::{json, Value};
use tracing::{info, instrument};

/// Send one raw request and print the response body
#[instrument(skip_all, fields(method = %args.method, path = %args.path))]
pub async fn handle_request(args: RequestArgs, config: &Config, output: &mut OutputWriter) -> Result<()> {
    let timer = Timer::with_details("request_command", &args.path);

    let method = parse_method(&args.method)?;
    let options = build_options(&args)?;

    let gateway = super::gateway(config)?;
    let client = OvhClient::new(&gateway)?;

    let spinner = output.spinner(&format!("{} {}...", method, args.path));
    let work = client.request::<Value>(method, &args.path, options);
    let result = match args.token {
        Some(token) => BearerPassthrough::scope(token, work).await,
        None => work.await,
    };
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    let response = result?;
    info!(status = response.status, "Request succeeded");
    match output.format() {
        OutputFormat::Human => output.data(&response.data)?,
        _ => output.data(&json!({"status": response.status, "data": response.data}))?,
    }

    timer.finish();
    Ok(())
}

fn parse_method(raw: &str) -> Result<Method> {
    match raw.to_uppercase().as_str() {
        "GET" => Ok(Method::GET),
        "POST" => Ok(Method::POST),
        "PUT" => Ok(Method::PUT),
        "DELETE" => Ok(Method::DELETE),
        other => Err(Error::invalid_args(format!(
            "unsupported method '{}' (expected GET, POST, PUT or DELETE)",
            other
        ))),
    }
}

fn build_options(args: &RequestArgs) -> Result<RequestOptions> {
    let mut options = RequestOptions::new().skip_retry(args.no_retry);

    for pair in &args.query {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| Error::invalid_args(format!("--query expects KEY=VALUE, got '{}'", pair)))?;
        if key.is_empty() {
            return Err(Error::invalid_args("--query key must not be empty"));
        }
        options = options.query(key, value);
    }

    match super::parse_json_arg("body", args.body.as_deref())? {
        Value::Null => {}
        body => options = options.body(body),
    }

    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(query: &[&str], body: Option<&str>) -> RequestArgs {
        RequestArgs {
            method: "get".to_string(),
            path: "/domain".to_string(),
            query: query.iter().map(|s| s.to_string()).collect(),
            body: body.map(str::to_string),
            no_retry: true,
            token: None,
        }
    }

    #[test]
    fn test_parse_method() {
        assert_eq!(parse_method("get").unwrap(), Method::GET);
        assert_eq!(parse_method("Delete").unwrap(), Method::DELETE);
        assert!(parse_method("PATCH").unwrap_err().should_show_help());
    }

    #[test]
    fn test_build_options() {
        let options = build_options(&args(&["a=1", "b=x=y"], Some(r#"{"date":"now"}"#))).unwrap();
        assert!(options.skip_retry);
        assert_eq!(
            options.query,
            vec![
                ("a".to_string(), Some("1".to_string())),
                ("b".to_string(), Some("x=y".to_string())),
            ]
        );
        assert_eq!(options.body, Some(json!({"date": "now"})));
    }

    #[test]
    fn test_build_options_rejects_bad_query() {
        assert!(build_options(&args(&["novalue"], None)).is_err());
        assert!(build_options(&args(&["=1"], None)).is_err());
    }
}
