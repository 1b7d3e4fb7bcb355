use chrono::Local;
use clap::Args;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use wearsync_core::{
    Consumer, DrawOp, FaceMetrics, FacePainter, FacePlan, LayoutFitter, MemoryHub, Producer,
    PublishOutcome, SyncChannel, WeatherSnapshot,
};

use crate::config::Config;

/// Width of one glyph relative to the text scale, for the demo measure
const GLYPH_ASPECT: f32 = 0.6;

const REDRAW_TIMEOUT: Duration = Duration::from_secs(2);

/// Run a phone and a watch against an in-process data layer
#[derive(Args)]
pub struct RunCommand {
    /// Number of publishes before exiting
    #[arg(long, default_value_t = 3)]
    pub count: u32,

    /// Delay between publishes, in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub interval_ms: u64,

    /// Today's high in degrees Celsius
    #[arg(long, default_value_t = 25.0, allow_negative_numbers = true)]
    pub max: f64,

    /// Today's low in degrees Celsius
    #[arg(long, default_value_t = 15.0, allow_negative_numbers = true)]
    pub min: f64,

    /// OpenWeatherMap condition code
    #[arg(long, default_value_t = 800)]
    pub condition: i32,

    /// Face canvas width in pixels
    #[arg(long, default_value_t = 320.0)]
    pub width: f32,

    /// Face canvas height in pixels
    #[arg(long, default_value_t = 320.0)]
    pub height: f32,
}

impl RunCommand {
    pub async fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let core = config.to_core();
        let painter = FacePainter::new(LayoutFitter::new(core.layout)?, FaceMetrics::default());

        let hub = MemoryHub::new();
        let phone_transport = hub.transport();
        let watch_transport = hub.transport();
        tracing::info!(
            phone = %phone_transport.node_id(),
            watch = %watch_transport.node_id(),
            "starting loopback"
        );

        let phone = Arc::new(SyncChannel::spawn(
            Arc::new(phone_transport),
            core.retry_policy,
        ));
        let watch = Arc::new(SyncChannel::spawn(
            Arc::new(watch_transport),
            core.retry_policy,
        ));

        let redraw = Arc::new(Notify::new());
        let notify = Arc::clone(&redraw);
        let consumer = Consumer::new(Arc::new(move || notify.notify_one()));
        let consumer_task = consumer.run(Arc::clone(&watch));

        let snapshot = WeatherSnapshot {
            temp_max: self.max,
            temp_min: self.min,
            condition_code: self.condition,
        };
        let producer = Producer::new(
            Arc::clone(&phone),
            Arc::new(move || Some(snapshot)),
            core.units,
        );
        tracing::info!(
            units = ?producer.units(),
            retry = ?watch.retry_policy(),
            "phone and watch ready"
        );

        for round in 1..=self.count {
            match producer.trigger().await? {
                PublishOutcome::Published(record) => {
                    println!("[{}] phone published {}", round, record);
                }
                PublishOutcome::NoSnapshot => {
                    println!("[{}] phone has no weather for today", round);
                    continue;
                }
                PublishOutcome::Failed(e) => return Err(e.into()),
            }

            tokio::time::timeout(REDRAW_TIMEOUT, redraw.notified()).await?;

            let state = consumer.render_state();
            let plan = painter.plan(
                Local::now().naive_local(),
                &state,
                self.width,
                self.height,
                &monospace,
            );
            print_plan(&plan);

            if round < self.count {
                tokio::time::sleep(Duration::from_millis(self.interval_ms)).await;
            }
        }

        watch.close();
        phone.close();
        consumer_task.await?;
        Ok(())
    }
}

fn monospace(text: &str, scale: f32) -> f32 {
    text.chars().count() as f32 * scale * GLYPH_ASPECT
}

fn print_plan(plan: &FacePlan) {
    println!("    watch face:");
    for op in &plan.ops {
        match op {
            DrawOp::Text {
                text,
                x,
                y,
                scale,
                style,
            } => println!(
                "      text  {:<18} at ({:.0}, {:.0}) scale {:.1} {:?}",
                format!("\"{}\"", text),
                x,
                y,
                scale,
                style
            ),
            DrawOp::Line { from, to } => println!(
                "      line  ({:.0}, {:.0}) -> ({:.0}, {:.0})",
                from.0, from.1, to.0, to.1
            ),
            DrawOp::Icon { icon, x, y } => println!(
                "      icon  {:<18} at ({:.0}, {:.0})",
                icon.resource_name(),
                x,
                y
            ),
        }
    }
}
