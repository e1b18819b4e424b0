use std::sync::Arc;

use slidesmith::{run_pipeline, Gateway};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut builder = Gateway::builder("gpt-4o-mini");
    if let Ok(key) = std::env::var("OPENAI_API_KEY") {
        builder = builder.provider_key(key);
    }
    // Optional caching proxy in front of the provider
    if let (Ok(url), Ok(key)) = (
        std::env::var("CACHE_PROXY_URL"),
        std::env::var("CACHE_PROXY_KEY"),
    ) {
        builder = builder.proxy(url, key);
    }
    let gateway = Arc::new(builder.build()?);

    // Without credentials every stage lands on its deterministic fallback,
    // so this runs offline too.
    let bundle = run_pipeline(gateway, "The history of container shipping", 8).await?;

    println!("Angle: {}", bundle.chosen_angle.title);
    for slide in &bundle.blueprint.slides {
        println!("  {}. {}", slide.slide_index, slide.slide_title);
        for point in &slide.content_points {
            println!("     - {}", point);
        }
    }
    println!("{} layout recipes composed.", bundle.recipes.len());
    Ok(())
}
