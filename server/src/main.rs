#[tokio::main]
async fn main() {
    ordersystem::start_server().await;
}
