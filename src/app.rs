use std::{
    sync::mpsc::{self, Receiver, TryRecvError},
    thread,
    time::{Duration, Instant},
};

use chrono::Utc;
use eframe::{
    App, CreationContext, Frame,
    egui::{self, Color32, Context, Layout, RichText},
};
use egui_extras::{Column, TableBuilder};

use crate::{
    domain::{Commit, StatEntry},
    feed::{self, FeedError},
    poller::{CommitPoller, InitialLoadJob, PollEvent},
    state::DashboardState,
    timefmt,
};

pub const APP_NAME: &str = "Neko Dash";

const SITE_URL: &str = "https://neko-cli.com";
const GH_COMMIT_PAGE: &str = "https://github.com/Neko-CLI/Neko-CLI/commit";

const POLL_INTERVAL_SECS: u64 = 30;
const RETRY_INTERVAL_SECS: u64 = 30;

const ACCENT: Color32 = Color32::from_rgb(0x52, 0x92, 0xF8);
const CARD_BG: Color32 = Color32::from_rgb(0x1F, 0x29, 0x37);
const WINDOW_BG: Color32 = Color32::from_rgb(0x0F, 0x17, 0x2A);

pub struct DashApp {
    state: DashboardState,
    initial_load: Option<InitialLoadJob>,
    poller: Option<CommitPoller>,
    logo: LogoSlot,
    retry: RetryScheduler,
}

impl DashApp {
    pub fn new(cc: &CreationContext<'_>) -> Self {
        cc.egui_ctx.set_visuals(egui::Visuals::dark());

        let mut app = Self {
            state: DashboardState::new(),
            initial_load: None,
            poller: None,
            logo: LogoSlot::Pending(LogoJob::spawn()),
            retry: RetryScheduler::new(Duration::from_secs(RETRY_INTERVAL_SECS)),
        };
        app.start_initial_load();
        app
    }

    fn start_initial_load(&mut self) {
        self.state.begin_load();
        self.retry.mark_triggered();
        self.initial_load = Some(InitialLoadJob::spawn());
    }

    fn start_poller(&mut self) {
        if self.poller.is_some() {
            return;
        }
        match CommitPoller::spawn(Duration::from_secs(POLL_INTERVAL_SECS)) {
            Ok(poller) => self.poller = Some(poller),
            Err(err) => tracing::error!("could not start commit poller: {err}"),
        }
    }

    fn poll_jobs(&mut self, ctx: &Context) {
        if let Some(job) = &self.initial_load
            && let Some(outcome) = job.try_take()
        {
            self.initial_load = None;
            match outcome {
                Ok(snapshot) => {
                    self.state.apply_snapshot(snapshot);
                    self.start_poller();
                }
                Err(err) => {
                    tracing::warn!("initial load failed: {err}");
                    self.state.load_failed(err.to_string());
                }
            }
        }

        if let Some(poller) = &self.poller {
            while let Some(event) = poller.try_recv() {
                match event {
                    PollEvent::Commits(commits) => self.state.handle_poll(commits),
                    PollEvent::Failed(err) => {
                        // Swallowed on purpose; the next cycle starts fresh.
                        tracing::debug!("poll cycle failed: {err}");
                    }
                }
            }
        }

        if let LogoSlot::Pending(job) = &self.logo
            && let Some(outcome) = job.try_take()
        {
            self.logo = match outcome {
                Ok(img) => LogoSlot::Ready(ctx.load_texture(
                    "neko-logo",
                    img,
                    egui::TextureOptions::LINEAR,
                )),
                Err(err) => {
                    tracing::warn!("logo fetch failed: {err}");
                    LogoSlot::Missing
                }
            };
        }
    }

    fn maybe_retry_load(&mut self) {
        // Only a failed startup fetch is retried here; once ready, the
        // periodic poller takes over.
        if self.initial_load.is_some() || self.state.load_error().is_none() {
            return;
        }
        if self.retry.should_trigger() {
            tracing::info!("retrying startup fetch");
            self.start_initial_load();
        }
    }

    fn render_header(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|row| {
            match &self.logo {
                LogoSlot::Ready(texture) => {
                    row.add(
                        egui::Image::new(texture)
                            .fit_to_exact_size(egui::vec2(48.0, 48.0))
                            .corner_radius(6),
                    );
                }
                LogoSlot::Pending(_) => {
                    row.add(egui::Spinner::new().size(24.0));
                }
                LogoSlot::Missing => {}
            }
            row.heading(RichText::new("Neko-CLI Updates").color(ACCENT).strong());

            row.with_layout(Layout::right_to_left(egui::Align::Center), |lane| {
                lane.hyperlink_to("Site", SITE_URL);
                if !self.state.notifications_enabled
                    && lane.button("Enable notifications").clicked()
                {
                    self.state.enable_notifications();
                }
            });
        });
    }

    fn render_dashboard(&mut self, ui: &mut egui::Ui) {
        if self.state.is_loading() {
            let error = self.state.load_error().map(str::to_owned);
            match error {
                None => {
                    ui.centered_and_justified(|center| {
                        center.add(egui::Spinner::new().size(40.0));
                    });
                }
                Some(err) => {
                    ui.add_space(24.0);
                    ui.vertical_centered(|center| {
                        center.colored_label(
                            center.visuals().error_fg_color,
                            format!("Could not load dashboard data: {err}"),
                        );
                        center.add_space(8.0);
                        if center.button("Retry").clicked() {
                            self.start_initial_load();
                        }
                    });
                }
            }
            return;
        }

        egui::ScrollArea::vertical().show(ui, |area| {
            render_version_card(area, &self.state.version);
            area.add_space(10.0);
            render_stats_card(area, &self.state.stats);
            area.add_space(10.0);
            render_commits_section(area, &self.state.commits, self.state.last_synced);
        });
    }

    fn render_toasts(&mut self, ctx: &Context) {
        let toasts = self.state.active_toasts().to_vec();
        for (idx, toast) in toasts.iter().enumerate() {
            egui::Area::new(egui::Id::new(("commit-toast", idx)))
                .anchor(
                    egui::Align2::RIGHT_TOP,
                    egui::vec2(-16.0, 16.0 + 72.0 * idx as f32),
                )
                .order(egui::Order::Foreground)
                .interactable(false)
                .show(ctx, |ui| {
                    card_frame().show(ui, |card| {
                        card.strong(RichText::new(&toast.title).color(Color32::WHITE));
                        card.label(RichText::new(&toast.body).color(Color32::GRAY));
                    });
                });
        }
    }
}

impl App for DashApp {
    fn update(&mut self, ctx: &Context, _frame: &mut Frame) {
        self.poll_jobs(ctx);
        self.maybe_retry_load();

        egui::CentralPanel::default()
            .frame(
                egui::Frame::NONE
                    .fill(WINDOW_BG)
                    .inner_margin(egui::Margin::same(12)),
            )
            .show(ctx, |ui| {
                self.render_header(ui);
                ui.add_space(8.0);
                self.render_dashboard(ui);
            });

        self.render_toasts(ctx);

        // Poll results arrive between frames; keep repainting while idle so
        // they are picked up without user input.
        ctx.request_repaint_after(Duration::from_millis(500));
    }
}

// -----------------------------------------------------------------------------
// Cards & chart
// -----------------------------------------------------------------------------

fn card_frame() -> egui::Frame {
    egui::Frame::NONE
        .fill(CARD_BG)
        .corner_radius(egui::CornerRadius::same(10))
        .inner_margin(egui::Margin::same(12))
}

fn render_version_card(ui: &mut egui::Ui, version: &str) {
    card_frame().show(ui, |card| {
        card.horizontal(|row| {
            row.label(RichText::new("Current Version:").strong().color(Color32::WHITE));
            row.monospace(RichText::new(version).color(ACCENT));
        });
        card.set_min_width(card.available_width());
    });
}

fn render_stats_card(ui: &mut egui::Ui, stats: &[StatEntry]) {
    card_frame().show(ui, |card| {
        card.label(RichText::new("NPM Downloads").strong().color(ACCENT));
        draw_bar_chart(card, stats);
    });
}

fn draw_bar_chart(ui: &mut egui::Ui, stats: &[StatEntry]) {
    const CHART_HEIGHT: f32 = 180.0;
    const ANNOTATION_H: f32 = 16.0;
    const LABEL_H: f32 = 18.0;

    let (rect, _) = ui.allocate_exact_size(
        egui::vec2(ui.available_width(), CHART_HEIGHT),
        egui::Sense::hover(),
    );
    if stats.is_empty() {
        return;
    }

    let painter = ui.painter_at(rect);
    // Scale against the widest window so the year bar always fills the plot.
    let max = stats.iter().map(|s| s.downloads).max().unwrap_or(1).max(1) as f32;
    let plot_h = CHART_HEIGHT - ANNOTATION_H - LABEL_H;
    let slot_w = rect.width() / stats.len() as f32;

    for (idx, entry) in stats.iter().enumerate() {
        let slot_left = rect.left() + slot_w * idx as f32;
        let bar_w = slot_w * 0.6;
        let bar_h = (entry.downloads as f32 / max) * plot_h;
        let bar = egui::Rect::from_min_max(
            egui::pos2(
                slot_left + (slot_w - bar_w) / 2.0,
                rect.top() + ANNOTATION_H + (plot_h - bar_h),
            ),
            egui::pos2(
                slot_left + (slot_w + bar_w) / 2.0,
                rect.top() + ANNOTATION_H + plot_h,
            ),
        );

        painter.rect_filled(bar, egui::CornerRadius::same(3), ACCENT);
        painter.text(
            egui::pos2(bar.center().x, bar.top() - 2.0),
            egui::Align2::CENTER_BOTTOM,
            entry.downloads.to_string(),
            egui::FontId::proportional(11.0),
            Color32::WHITE,
        );
        painter.text(
            egui::pos2(bar.center().x, rect.bottom()),
            egui::Align2::CENTER_BOTTOM,
            entry.window.label(),
            egui::FontId::proportional(12.0),
            Color32::GRAY,
        );
    }
}

// -----------------------------------------------------------------------------
// Commit list
// -----------------------------------------------------------------------------

fn render_commits_section(
    ui: &mut egui::Ui,
    commits: &[Commit],
    last_synced: Option<chrono::DateTime<Utc>>,
) {
    ui.horizontal(|row| {
        row.label(RichText::new("GitHub Commits").strong().color(ACCENT));
        if let Some(synced) = last_synced {
            row.with_layout(Layout::right_to_left(egui::Align::Center), |lane| {
                lane.weak(format!("Synced {} UTC", synced.format("%H:%M:%S")));
            });
        }
    });

    if commits.is_empty() {
        ui.weak("No commits fetched yet.");
        return;
    }

    let now = Utc::now();
    TableBuilder::new(ui)
        .striped(true)
        .column(Column::initial(80.0))
        .column(Column::remainder())
        .column(Column::initial(140.0).resizable(true))
        .column(Column::initial(90.0))
        .header(20.0, |mut header| {
            header.col(|ui| {
                ui.strong("SHA");
            });
            header.col(|ui| {
                ui.strong("Message");
            });
            header.col(|ui| {
                ui.strong("Author");
            });
            header.col(|ui| {
                ui.strong("When");
            });
        })
        .body(|mut body| {
            for commit in commits {
                body.row(24.0, |mut row| {
                    row.col(|ui| {
                        ui.monospace(commit.short_sha());
                    });
                    row.col(|ui| {
                        let summary = commit.message.lines().next().unwrap_or("");
                        ui.hyperlink_to(summary, commit_page_url(&commit.sha));
                    });
                    row.col(|ui| {
                        ui.label(&commit.author);
                    });
                    row.col(|ui| {
                        ui.label(timefmt::relative(commit.date, now));
                    });
                });
            }
        });
}

fn commit_page_url(sha: &str) -> String {
    format!("{GH_COMMIT_PAGE}/{sha}")
}

// -----------------------------------------------------------------------------
// Logo loading
// -----------------------------------------------------------------------------

enum LogoSlot {
    Pending(LogoJob),
    Ready(egui::TextureHandle),
    Missing,
}

type LogoOutcome = Result<egui::ColorImage, String>;

struct LogoJob {
    receiver: Receiver<LogoOutcome>,
}

impl LogoJob {
    fn spawn() -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let _ = tx.send(Self::worker());
        });
        Self { receiver: rx }
    }

    fn worker() -> LogoOutcome {
        let bytes = (|| -> Result<Vec<u8>, FeedError> {
            let client = feed::build_client()?;
            feed::fetch_logo(&client)
        })()
        .map_err(|err| err.to_string())?;

        let decoded = image::load_from_memory(&bytes).map_err(|err| err.to_string())?;
        let rgba = decoded.to_rgba8();
        let size = [rgba.width() as usize, rgba.height() as usize];
        Ok(egui::ColorImage::from_rgba_unmultiplied(size, &rgba.into_raw()))
    }

    fn try_take(&self) -> Option<LogoOutcome> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                Some(Err("logo worker disconnected".to_owned()))
            }
        }
    }
}

// -----------------------------------------------------------------------------
// Supporting structs
// -----------------------------------------------------------------------------

struct RetryScheduler {
    interval: Duration,
    last_attempt: Option<Instant>,
}

impl RetryScheduler {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_attempt: None,
        }
    }

    fn should_trigger(&self) -> bool {
        match self.last_attempt {
            None => true,
            Some(instant) => instant.elapsed() >= self.interval,
        }
    }

    fn mark_triggered(&mut self) {
        self.last_attempt = Some(Instant::now());
    }
}
