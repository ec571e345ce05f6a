/**
 * Schema Fetch Example
 *
 * Downloads (or loads from the on-disk cache) the MIoT schema for a device
 * model and prints its services, properties and actions.
 */
use rustmiio::MiotCloud;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let model = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "zhimi.airpurifier.ma4".to_string());

    println!("--- Rustmiio - Schema Fetch ---");
    println!("[INFO] Resolving schema for model '{model}'...");

    // 1. Resolve the released schema version and fetch or reuse the cache
    let cloud = MiotCloud::new()?;
    let device_model = cloud.get_device_model(&model).await?;

    println!("[INFO] {} ({})", device_model.description, device_model.urn);

    // 2. Walk the parsed service tree
    for service in &device_model.services {
        println!("  [{}] {}", service.siid, service.name());
        for property in &service.properties {
            println!(
                "    p{:<3} {:<40} {:?}",
                property.piid.unwrap_or(0),
                property.name(),
                property.access
            );
        }
        for action in &service.actions {
            println!("    a{:<3} {}", action.aiid, action.name());
        }
    }

    Ok(())
}
