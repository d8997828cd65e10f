#[rocket::main]
async fn main() {
    if let Err(e) = swipe_engine::engine().launch().await {
        eprintln!("server error: {}", e);
    }
}
