use std::sync::Arc;

use slidesmith::stages::BlueprintBuilder;
use slidesmith::{Gateway, StreamEvent};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut builder = Gateway::builder("gpt-4o-mini");
    if let Ok(key) = std::env::var("OPENAI_API_KEY") {
        builder = builder.provider_key(key);
    }
    let gateway = Arc::new(builder.build()?);

    let angle = slidesmith::stages::fallback_angles("urban farming")
        .angles
        .remove(0);

    let blueprint = BlueprintBuilder::new(gateway)
        .generate_streaming("urban farming", &angle, 6, &mut |event| match event {
            StreamEvent::Metadata { slide_count, .. } => {
                println!("expecting {} slides", slide_count);
            }
            StreamEvent::Slide { slide } => {
                println!("  [{}] {}", slide.slide_index, slide.slide_title);
            }
            StreamEvent::Complete => println!("done"),
            StreamEvent::Error { message } => eprintln!("stream error: {}", message),
        })
        .await?;

    println!("{} slides collected.", blueprint.slides.len());
    Ok(())
}
