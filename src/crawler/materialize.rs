//! Content materialization protocol
//!
//! Dynamic sites only put their real content into the DOM after timers,
//! scroll events or carousel interaction. Before the headless backend
//! captures a page it runs an ordered list of named steps, each bounded by
//! its own timeout. A step that fails or times out is recorded and the
//! protocol moves on; capture always happens.

use super::render::RenderedPage;
use crate::config::HeadlessConfig;
use anyhow::Result;
use async_trait::async_trait;
use std::time::{Duration, Instant};

/// Carousel, slider and hero selectors shared by the image and reveal steps
const SLIDE_SELECTORS: &str = "[class*='carousel'], [class*='slider'], [class*='slide'], \
    [class*='swiper'], [class*='hero'], [class*='banner'], [class*='slick'], \
    [class*='owl-'], [class*='splide'], [class*='glide'], [data-slide], [data-carousel]";

/// Lazy-load attributes promoted to real sources
const LAZY_ATTRIBUTES: &str =
    "['data-src', 'data-lazy-src', 'data-original', 'data-lazy', 'data-url']";

/// Per-page facts a step may depend on
#[derive(Debug, Clone, Copy)]
pub struct StepContext {
    /// True only for the first page fetched by the crawl
    pub first_page: bool,
}

/// One best-effort step of the protocol
#[async_trait]
pub trait MaterializeStep: Send + Sync {
    fn name(&self) -> &str;

    /// Upper bound for [`MaterializeStep::run`]
    fn timeout(&self, ctx: &StepContext) -> Duration;

    async fn run(&self, page: &dyn RenderedPage, ctx: &StepContext) -> Result<()>;
}

/// How a single step ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Completed,
    Failed(String),
    TimedOut,
}

/// Outcome and duration of one step
#[derive(Debug, Clone)]
pub struct StepReport {
    pub name: String,
    pub outcome: StepOutcome,
    pub elapsed: Duration,
}

/// Per-page record of a protocol run
#[derive(Debug, Clone, Default)]
pub struct MaterializationReport {
    pub steps: Vec<StepReport>,
}

impl MaterializationReport {
    pub fn completed(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.outcome == StepOutcome::Completed)
            .count()
    }
}

/// Ordered list of steps run against every page
pub struct MaterializationProtocol {
    steps: Vec<Box<dyn MaterializeStep>>,
}

impl MaterializationProtocol {
    pub fn new(steps: Vec<Box<dyn MaterializeStep>>) -> Self {
        Self { steps }
    }

    /// The fixed seven-step sequence
    ///
    /// 1. Initial wait (longer on the first page)
    /// 2. Wait for carousel/slider/hero images
    /// 3. Reveal hidden slides and promote their lazy sources
    /// 4. Click "next" controls to cycle carousels
    /// 5. Scroll the whole document, then back to the top
    /// 6. Wait for any still incomplete `<img>`
    /// 7. Settle delay
    pub fn standard(config: &HeadlessConfig) -> Self {
        let image_timeout = config.image_timeout_ms;
        let slack = Duration::from_millis(2000);

        let steps: Vec<Box<dyn MaterializeStep>> = vec![
            Box::new(DelayStep {
                name: "initial-wait",
                first_page: Duration::from_millis(config.first_page_wait_ms),
                later: Duration::from_millis(config.page_wait_ms),
            }),
            Box::new(ScriptStep {
                name: "hero-images",
                script: wait_for_images_script(Some(SLIDE_SELECTORS), image_timeout),
                timeout: Duration::from_millis(image_timeout) + slack,
            }),
            Box::new(ScriptStep {
                name: "reveal-slides",
                script: reveal_slides_script(),
                timeout: slack,
            }),
            Box::new(ScriptStep {
                name: "cycle-carousels",
                script: cycle_carousels_script(config.carousel_rounds),
                timeout: Duration::from_millis(u64::from(config.carousel_rounds) * 600) + slack,
            }),
            Box::new(ScriptStep {
                name: "auto-scroll",
                script: auto_scroll_script(config.scroll_step_px, config.scroll_delay_ms),
                timeout: Duration::from_millis(config.scroll_delay_ms * MAX_SCROLL_STEPS) + slack,
            }),
            Box::new(ScriptStep {
                name: "pending-images",
                script: wait_for_images_script(None, image_timeout),
                timeout: Duration::from_millis(image_timeout) + slack,
            }),
            Box::new(DelayStep {
                name: "settle",
                first_page: Duration::from_millis(config.settle_ms),
                later: Duration::from_millis(config.settle_ms),
            }),
        ];

        Self::new(steps)
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Upper bound of a full run
    pub fn total_timeout(&self, ctx: &StepContext) -> Duration {
        self.steps.iter().map(|s| s.timeout(ctx)).sum()
    }

    /// Runs every step in order; never fails
    pub async fn run(&self, page: &dyn RenderedPage, ctx: StepContext) -> MaterializationReport {
        let mut report = MaterializationReport::default();

        for step in &self.steps {
            let started = Instant::now();
            let outcome = match tokio::time::timeout(step.timeout(&ctx), step.run(page, &ctx)).await
            {
                Ok(Ok(())) => StepOutcome::Completed,
                Ok(Err(e)) => StepOutcome::Failed(e.to_string()),
                Err(_) => StepOutcome::TimedOut,
            };

            tracing::trace!("Step {} -> {:?}", step.name(), outcome);
            report.steps.push(StepReport {
                name: step.name().to_string(),
                outcome,
                elapsed: started.elapsed(),
            });
        }

        report
    }
}

/// Fixed sleep, different for the first page
struct DelayStep {
    name: &'static str,
    first_page: Duration,
    later: Duration,
}

impl DelayStep {
    fn delay(&self, ctx: &StepContext) -> Duration {
        if ctx.first_page {
            self.first_page
        } else {
            self.later
        }
    }
}

#[async_trait]
impl MaterializeStep for DelayStep {
    fn name(&self) -> &str {
        self.name
    }

    fn timeout(&self, ctx: &StepContext) -> Duration {
        self.delay(ctx) + Duration::from_millis(500)
    }

    async fn run(&self, _page: &dyn RenderedPage, ctx: &StepContext) -> Result<()> {
        tokio::time::sleep(self.delay(ctx)).await;
        Ok(())
    }
}

/// Evaluates one in-page script
struct ScriptStep {
    name: &'static str,
    script: String,
    timeout: Duration,
}

#[async_trait]
impl MaterializeStep for ScriptStep {
    fn name(&self) -> &str {
        self.name
    }

    fn timeout(&self, _ctx: &StepContext) -> Duration {
        self.timeout
    }

    async fn run(&self, page: &dyn RenderedPage, _ctx: &StepContext) -> Result<()> {
        page.evaluate(&self.script).await.map(|_| ())
    }
}

/// Scroll increments before the auto-scroll gives up on infinite pages
const MAX_SCROLL_STEPS: u64 = 150;

fn wait_for_images_script(scope: Option<&str>, timeout_ms: u64) -> String {
    let selector = match scope {
        Some(scope) => format!("{} img", scope.replace(", ", " img, ")),
        None => "img".to_string(),
    };

    format!(
        r#"(async () => {{
  const imgs = Array.from(document.querySelectorAll("{selector}")).filter(i => !i.complete);
  await Promise.all(imgs.map(img => new Promise(resolve => {{
    const done = () => resolve();
    img.addEventListener('load', done, {{ once: true }});
    img.addEventListener('error', done, {{ once: true }});
    setTimeout(done, {timeout_ms});
  }})));
  return imgs.length;
}})()"#
    )
}

fn reveal_slides_script() -> String {
    format!(
        r#"(async () => {{
  const lazy = {LAZY_ATTRIBUTES};
  let revealed = 0;
  document.querySelectorAll("{SLIDE_SELECTORS}").forEach(el => {{
    const s = el.style;
    if (s.display === 'none') {{ s.display = 'block'; revealed++; }}
    if (s.visibility === 'hidden') {{ s.visibility = 'visible'; revealed++; }}
    if (s.opacity === '0') {{ s.opacity = '1'; revealed++; }}
    el.querySelectorAll('img').forEach(img => {{
      for (const attr of lazy) {{
        const v = img.getAttribute(attr);
        if (v) {{ img.setAttribute('src', v); break; }}
      }}
      const set = img.getAttribute('data-srcset');
      if (set) img.setAttribute('srcset', set);
    }});
  }});
  return revealed;
}})()"#
    )
}

fn cycle_carousels_script(rounds: u32) -> String {
    format!(
        r#"(async () => {{
  const sleep = ms => new Promise(r => setTimeout(r, ms));
  const next = Array.from(document.querySelectorAll(
    "[class*='next'], [aria-label*='next' i], [aria-label*='Next'], .slick-next, .swiper-button-next, .owl-next, .carousel-control-next, .splide__arrow--next, .glide__arrow--right"
  ));
  let clicks = 0;
  for (let round = 0; round < {rounds}; round++) {{
    for (const btn of next) {{
      try {{ btn.click(); clicks++; }} catch (e) {{}}
    }}
    await sleep(400);
  }}
  return clicks;
}})()"#
    )
}

fn auto_scroll_script(step_px: u32, delay_ms: u64) -> String {
    format!(
        r#"(async () => {{
  const sleep = ms => new Promise(r => setTimeout(r, ms));
  let y = 0;
  for (let i = 0; i < {MAX_SCROLL_STEPS}; i++) {{
    const height = Math.max(document.body ? document.body.scrollHeight : 0, document.documentElement.scrollHeight);
    if (y >= height) break;
    y += {step_px};
    window.scrollTo(0, y);
    await sleep({delay_ms});
  }}
  window.scrollTo(0, 0);
  return y;
}})()"#
    )
}
