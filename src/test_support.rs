//! Shared fixtures for unit tests that talk to real HTTP sockets.

use std::net::SocketAddr;

use axum::Router;

/// Serve `app` on an ephemeral local port from a dedicated thread and
/// return its base URL. The blocking reqwest clients under test must not
/// run inside a tokio runtime, so the stub gets its own.
pub fn spawn_http_stub(app: Router) -> String {
    let (tx, rx) = std::sync::mpsc::channel::<SocketAddr>();
    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async move {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            tx.send(listener.local_addr().unwrap()).unwrap();
            axum::serve(listener, app).await.unwrap();
        });
    });
    let addr = rx.recv().unwrap();
    format!("http://{addr}")
}

/// A small valid PNG, suitable for the OCR preparation step.
pub fn receipt_png_bytes() -> Vec<u8> {
    use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(24, 36, Rgb([235, 235, 235])));
    let mut cursor = std::io::Cursor::new(Vec::new());
    img.write_to(&mut cursor, ImageOutputFormat::Png).unwrap();
    cursor.into_inner()
}
