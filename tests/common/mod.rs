#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use proair::{ProAirClient, TransportConfig};
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

type Responder = Arc<dyn Fn(&Value) -> Option<String> + Send + Sync>;

/// A scripted control unit on a loopback port. Every connection carries one
/// request; the responder decides the reply, or `None` to hang up silently.
pub struct FakeDevice {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<Value>>>,
}

impl FakeDevice {
    pub async fn start(responder: impl Fn(&Value) -> Option<String> + Send + Sync + 'static) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let responder: Responder = Arc::new(responder);

        let log = requests.clone();
        tokio::spawn(async move {
            while let Ok((sock, _)) = listener.accept().await {
                let log = log.clone();
                let responder = responder.clone();
                tokio::spawn(handle(sock, log, responder));
            }
        });

        Self { addr, requests }
    }

    /// Every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|r| r["c"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    pub fn last_request(&self, command: &str) -> Option<Value> {
        self.requests().into_iter().rev().find(|r| r["c"] == command)
    }

    pub fn client(&self) -> ProAirClient {
        ProAirClient::builder(self.addr.ip().to_string())
            .port(self.addr.port())
            .pin("2909")
            .transport_config(fast_transport())
            .build()
            .unwrap()
    }
}

async fn handle(mut sock: TcpStream, log: Arc<Mutex<Vec<Value>>>, responder: Responder) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 512];
    let request = loop {
        match sock.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if let Ok(value) = serde_json::from_slice::<Value>(&buf) {
                    break value;
                }
            }
        }
    };
    log.lock().unwrap().push(request.clone());

    if let Some(reply) = responder(&request) {
        let _ = sock.write_all(reply.as_bytes()).await;
        let _ = sock.shutdown().await;
    }
}

pub fn fast_transport() -> TransportConfig {
    TransportConfig {
        connect_timeout: Duration::from_millis(200),
        read_timeout: Duration::from_millis(100),
        timeout_pause: Duration::from_millis(20),
        connect_pause: Duration::from_millis(20),
        ..TransportConfig::default()
    }
}

pub fn ok() -> Option<String> {
    Some(r#"{"res":1}"#.to_string())
}

pub fn full_zone(id: u8, name: &str, t: i64, t_set: i64) -> Value {
    json!({
        "id_zona": id,
        "name": name,
        "is_off": 0,
        "t": t,
        "t_set": t_set,
        "fan": 18,
        "fan_set": 16,
        "shu": 1,
        "shu_set": 2,
        "EV": 0,
        "is_crono": 0,
        "crono_on": 0,
        "u": 0,
        "u_set": 0,
        "c_win": 0,
        "c_badge": 0,
        "err": 0,
    })
}

/// Heating, unit on, canal at 20.5 °C.
pub fn full_status(zones: Vec<Value>) -> Value {
    json!({
        "c": "stato",
        "is_off": 0,
        "is_cool": 0,
        "cool_mod": 1,
        "t_can": 205,
        "f_inv": 3,
        "f_est": 4,
        "master_nr": 1,
        "ir_present": 0,
        "err_cu": 0,
        "zone": zones,
    })
}

pub fn three_zone_status() -> Value {
    full_status(vec![
        full_zone(1, "Living", 210, 200),
        full_zone(2, "Kitchen", 190, 200),
        full_zone(3, "Bedroom", 180, 190),
    ])
}

/// Zone detail reply in the wrapped form: one-element `zone` array.
pub fn zone_detail(zone: Value) -> String {
    json!({ "c": "stato_zona", "zone": [zone] }).to_string()
}
