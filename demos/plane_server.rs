//! Plane server: synthetic depth feed -> plane estimate -> WebSocket.
//!
//! Broadcasts one JSON object per published snapshot to every connected
//! WebSocket client:
//!
//! {"frame":42,"nx":0.0012,"ny":0.9981,"nz":0.0615,"px":-0.41,"py":-1.20,"pz":2.73,"points":76800,"band":51234}
//!
//! Frames without a plane are sent as {"frame":43,"plane":null,"points":120}.
//!
//! Usage:
//!   cargo run --release --example plane_server
//!   Connect a WebSocket client to ws://localhost:8090

use depthplane::{
    DepthFrame, FrameSnapshot, ImageSize, PinholeMapper, PipelineConfig, RawFrame, SensorSession,
};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tungstenite::Message;

const PORT: u16 = 8090;
const SIZE: ImageSize = ImageSize::new(160, 120);

type WsClient = Arc<Mutex<tungstenite::WebSocket<TcpStream>>>;

fn main() {
    env_logger::init();

    let clients: Arc<Mutex<Vec<WsClient>>> = Arc::new(Mutex::new(Vec::new()));
    let running = Arc::new(AtomicBool::new(true));

    let plane_clients = clients.clone();
    let plane_running = running.clone();
    let plane_thread = std::thread::Builder::new()
        .name("plane-broadcast".into())
        .spawn(move || {
            plane_loop(plane_clients, plane_running);
        })
        .expect("Failed to spawn plane thread");

    let listener = TcpListener::bind(format!("0.0.0.0:{}", PORT)).unwrap_or_else(|e| {
        eprintln!("Failed to bind port {}: {}", PORT, e);
        std::process::exit(1);
    });
    eprintln!("[WS] Listening on ws://localhost:{}", PORT);

    for stream in listener.incoming() {
        let stream = match stream {
            Ok(s) => s,
            Err(e) => {
                eprintln!("[TCP] accept error: {}", e);
                continue;
            }
        };
        let clients = clients.clone();
        std::thread::spawn(move || handle_websocket(stream, clients));
    }

    running.store(false, Ordering::Relaxed);
    let _ = plane_thread.join();
}

/// Complete the handshake and register the client for broadcasts.
///
/// The broadcast thread is the only writer; it removes a client when a send
/// fails.
fn handle_websocket(stream: TcpStream, clients: Arc<Mutex<Vec<WsClient>>>) {
    stream.set_nodelay(true).ok();
    stream.set_write_timeout(Some(Duration::from_secs(2))).ok();

    let ws = match tungstenite::accept(stream) {
        Ok(ws) => ws,
        Err(e) => {
            eprintln!("[WS] handshake error: {}", e);
            return;
        }
    };

    let mut list = clients.lock().unwrap();
    list.push(Arc::new(Mutex::new(ws)));
    eprintln!("[WS] Client connected ({} total)", list.len());
}

/// Drive a synthetic sensor through a session and broadcast each snapshot.
fn plane_loop(clients: Arc<Mutex<Vec<WsClient>>>, running: Arc<AtomicBool>) {
    let mapper = PinholeMapper {
        fx: 148.6,
        fy: 147.8,
        cx: 80.0,
        cy: 60.0,
        color_scale: 1.0,
    };
    let config = PipelineConfig::from_env();
    let pipeline = depthplane::FramePipeline::new(config, Arc::new(mapper));
    let session = match SensorSession::start(pipeline) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("[PLANE] Failed to start session: {}", e);
            return;
        }
    };
    let sink = session.sink();
    let stream = session.subscribe(2);

    let mut frame_number = 0u64;
    let mut sent = 0u64;
    let mut last_report = std::time::Instant::now();

    while running.load(Ordering::Relaxed) {
        sink.submit(floor_frame(frame_number, &mapper));
        frame_number += 1;

        if let Some(snapshot) = stream.try_recv() {
            let msg = Message::Text(snapshot_json(&snapshot));
            let mut list = clients.lock().unwrap();
            list.retain(|ws_arc| {
                let mut ws = ws_arc.lock().unwrap();
                ws.send(msg.clone()).is_ok()
            });
            sent += 1;
        }

        if last_report.elapsed() >= Duration::from_secs(5) {
            eprintln!(
                "[PLANE] {} frames, {} broadcasts, {} client(s)",
                frame_number,
                sent,
                clients.lock().unwrap().len()
            );
            last_report = std::time::Instant::now();
        }

        std::thread::sleep(Duration::from_millis(33));
    }
}

fn snapshot_json(snapshot: &FrameSnapshot) -> String {
    match &snapshot.plane {
        Some(plane) => {
            let n = plane.normal().normalized().unwrap_or(depthplane::Vec3::ZERO);
            let p = plane.point();
            format!(
                "{{\"frame\":{},\"nx\":{:.4},\"ny\":{:.4},\"nz\":{:.4},\"px\":{:.3},\"py\":{:.3},\"pz\":{:.3},\"points\":{},\"band\":{}}}",
                snapshot.frame_number,
                n.x,
                n.y,
                n.z,
                p.x,
                p.y,
                p.z,
                snapshot.points.len(),
                snapshot.band.len(),
            )
        }
        None => format!(
            "{{\"frame\":{},\"plane\":null,\"points\":{}}}",
            snapshot.frame_number,
            snapshot.points.len()
        ),
    }
}

/// A floor 1.2 m below the camera; pixels above the horizon read nothing.
fn floor_frame(frame_number: u64, mapper: &PinholeMapper) -> RawFrame {
    let mut depth = vec![0u16; SIZE.len()];
    for y in 0..SIZE.height {
        let down = (y as f64 - mapper.cy) / mapper.fy;
        if down <= 0.0 {
            continue;
        }
        let mm = (1.2 / down * 1000.0).min(u16::MAX as f64) as u16;
        depth[y * SIZE.width..(y + 1) * SIZE.width].fill(mm);
    }
    RawFrame {
        frame_number,
        depth: DepthFrame::new(SIZE, depth, 400, 4000).expect("depth size"),
        color: None,
    }
}
