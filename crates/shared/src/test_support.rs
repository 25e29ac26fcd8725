//! # ログキャプチャ
//!
//! テストでログイベントを検査するための tracing Layer。
//! イベント自身のフィールドに加え、イベントを囲むスパンのフィールドも記録するので、
//! 「アクセスログがリクエストスパンの内側で出力されたか」を検証できる。
//!
//! ```ignore
//! let (_guard, capture) = LogCapture::install();
//! // ... リクエストを送る ...
//! let lines = capture.canonical_lines();
//! assert_eq!(lines[0].span_field("request_id"), Some(request_id));
//! ```

use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

use tracing::{
    Event,
    Level,
    Subscriber,
    field::Field,
    span::{Attributes, Id},
    subscriber::DefaultGuard,
};
use tracing_subscriber::{
    Layer,
    layer::{Context, SubscriberExt},
    registry::LookupSpan,
};

/// キャプチャしたログイベント
#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub level:   Level,
    pub message: String,
    fields:      Vec<(String, String)>,
    /// 内側のスパンから外側へ順に並んだスパンフィールド
    span_fields: Vec<(String, String)>,
}

impl CapturedEvent {
    /// イベントのフィールド値
    pub fn field(&self, name: &str) -> Option<&str> {
        lookup(&self.fields, name)
    }

    /// イベントを囲むスパンのフィールド値（最も内側のスパンを優先）
    pub fn span_field(&self, name: &str) -> Option<&str> {
        lookup(&self.span_fields, name)
    }

    /// Canonical Log Line か
    pub fn is_canonical(&self) -> bool {
        self.field("log.type") == Some("canonical")
    }
}

fn lookup<'a>(fields: &'a [(String, String)], name: &str) -> Option<&'a str> {
    fields
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

/// スパン生成時に記録したフィールド（スパンの extensions に保存する）
struct SpanFields(Vec<(String, String)>);

/// ログイベントを蓄積する Layer
#[derive(Debug, Clone, Default)]
pub struct LogCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl LogCapture {
    /// キャプチャ subscriber をスレッドのデフォルトに設定する
    ///
    /// 返り値の `DefaultGuard` はスコープに保持すること（ドロップでリセット）。
    /// `#[tokio::test]` の current_thread ランタイムなら、ハンドラのログもここに届く。
    pub fn install() -> (DefaultGuard, Self) {
        let capture = Self::default();
        let subscriber = tracing_subscriber::registry().with(capture.clone());
        (tracing::subscriber::set_default(subscriber), capture)
    }

    /// ここまでにキャプチャしたイベント
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Canonical Log Line のみ
    pub fn canonical_lines(&self) -> Vec<CapturedEvent> {
        self.events()
            .into_iter()
            .filter(CapturedEvent::is_canonical)
            .collect()
    }
}

impl<S> Layer<S> for LogCapture
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut fields = Vec::new();
        attrs.record(&mut |field: &Field, value: &dyn fmt::Debug| {
            fields.push((field.name().to_string(), render(value)));
        });

        if let Some(span) = ctx.span(id) {
            span.extensions_mut().insert(SpanFields(fields));
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let mut message = String::new();
        let mut fields = Vec::new();
        event.record(&mut |field: &Field, value: &dyn fmt::Debug| {
            if field.name() == "message" {
                message = render(value);
            } else {
                fields.push((field.name().to_string(), render(value)));
            }
        });

        let span_fields = ctx
            .event_scope(event)
            .into_iter()
            .flatten()
            .flat_map(|span| {
                span.extensions()
                    .get::<SpanFields>()
                    .map(|SpanFields(fields)| fields.clone())
                    .unwrap_or_default()
            })
            .collect();

        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(CapturedEvent {
                level: *event.metadata().level(),
                message,
                fields,
                span_fields,
            });
    }
}

/// `&str` フィールドの Debug 表現から引用符を外す
fn render(value: &dyn fmt::Debug) -> String {
    format!("{value:?}").trim_matches('"').to_string()
}
