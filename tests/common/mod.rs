//! Mock graph backend for integration tests
//!
//! A tiny_http server on an ephemeral port. Each request is answered by the
//! route function and recorded as "METHOD /path".

#![allow(dead_code)]

use std::io::Read;
use std::sync::{Arc, Mutex};
use std::thread;
use tiny_http::{Header, Response, Server};

pub type Route = dyn Fn(&str, &str, &str) -> (u16, String) + Send + Sync + 'static;

pub struct MockBackend {
    pub url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockBackend {
    /// `route(method, path, body)` returns the status and JSON body
    pub fn start<F>(route: F) -> Self
    where
        F: Fn(&str, &str, &str) -> (u16, String) + Send + Sync + 'static,
    {
        let server = Server::http("127.0.0.1:0").expect("Failed to bind mock backend");
        let port = server
            .server_addr()
            .to_ip()
            .expect("Mock backend should listen on TCP")
            .port();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let log = requests.clone();
        let route: Box<Route> = Box::new(route);

        thread::spawn(move || {
            for mut request in server.incoming_requests() {
                let method = request.method().to_string().to_uppercase();
                let path = request.url().split('?').next().unwrap_or("/").to_string();
                let mut body = String::new();
                let _ = request.as_reader().read_to_string(&mut body);
                log.lock().unwrap().push(format!("{} {}", method, path));

                let (status, json) = route(&method, &path, &body);
                let response = Response::from_string(json)
                    .with_status_code(status)
                    .with_header(Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap());
                let _ = request.respond(response);
            }
        });

        Self {
            url: format!("http://127.0.0.1:{}", port),
            requests,
        }
    }

    pub fn api_root(&self) -> String {
        format!("{}/api", self.url)
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

/// A two-view graph as the backend returns it
pub fn sample_graph_json() -> String {
    serde_json::json!({
        "nodes": [
            {"id": "1", "view_id": 1, "name": "Orders", "name2": "dbo.Orders", "alias": null},
            {"id": "2", "view_id": 2, "name": "Customers", "name2": null, "alias": "Cust"}
        ],
        "edges": [
            {"id": "r1", "source": "1", "target": "2", "relation": "LEFT JOIN Customers ON 1=1", "relation2": null, "edge_weight": 10}
        ]
    })
    .to_string()
}

pub fn sample_stats_json() -> String {
    serde_json::json!({"views_count": 2, "relations_count": 1}).to_string()
}
