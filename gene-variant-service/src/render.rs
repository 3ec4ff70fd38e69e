//! HTML rendering. Every function here is a pure function of its input; the
//! handlers call them once per state change.

use std::fmt::Write as _;

use crate::models::{Locus, MutationCategory, SessionCursor, StepAsset, WalkthroughStep};

const IDEOGRAM_SCRIPT: &str = "https://cdn.jsdelivr.net/npm/ideogram@1.53.0/dist/js/ideogram.min.js";

/// Everything the walkthrough page shows
#[derive(Debug, Clone)]
pub struct WalkthroughView {
    pub session_id: String,
    pub cursor: SessionCursor,
    pub locus: Locus,
    pub category: MutationCategory,
    pub steps: Vec<WalkthroughStep>,
}

impl WalkthroughView {
    pub fn current_step(&self) -> Option<&WalkthroughStep> {
        self.steps.get(self.cursor.step_index)
    }
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn image_src(png_base64: &str) -> String {
    format!("data:image/png;base64,{}", png_base64)
}

fn render_band_diagram(chromosome: &str, start: u64, end: u64) -> String {
    let chromosome = escape_html(chromosome);
    format!(
        r#"<div id="band-diagram" class="band-diagram" data-chromosome="{chromosome}" data-start="{start}" data-end="{end}"></div>
<script src="{IDEOGRAM_SCRIPT}"></script>
<script>
  new Ideogram({{
    organism: 'human',
    container: '#band-diagram',
    chromosome: '{chromosome}',
    brush: 'chr{chromosome}:{start}-{end}',
    orientation: 'horizontal',
    chrHeight: 600
  }});
</script>"#
    )
}

fn render_current(step: &WalkthroughStep) -> String {
    match &step.asset {
        StepAsset::Image { png_base64 } => format!(
            r#"<img id="walkthrough" class="step-image" alt="{alt}" src="{src}" onclick="navigate('next')" />"#,
            alt = escape_html(&step.key.name()),
            src = image_src(png_base64),
        ),
        StepAsset::BandDiagram {
            chromosome,
            start,
            end,
        } => format!(
            r#"<div class="step-visual" onclick="navigate('next')">{}</div>"#,
            render_band_diagram(chromosome, *start, *end)
        ),
    }
}

fn render_gallery(view: &WalkthroughView) -> String {
    let mut gallery = String::from(r#"<div class="gallery">"#);
    for (index, step) in view.steps.iter().enumerate() {
        let selected = if index == view.cursor.step_index {
            " selected"
        } else {
            ""
        };
        let thumb = match &step.asset {
            StepAsset::Image { png_base64 } => {
                format!(r#"<img alt="Step {}" src="{}" />"#, index + 1, image_src(png_base64))
            }
            StepAsset::BandDiagram { chromosome, .. } => {
                format!(r#"<span>Bands chr{}</span>"#, escape_html(chromosome))
            }
        };
        let _ = write!(
            gallery,
            r#"<button class="thumb{selected}" onclick="navigate('select/{index}')">{thumb}</button>"#
        );
    }
    gallery.push_str("</div>");
    gallery
}

/// Page for the session's current step
pub fn render_walkthrough(view: &WalkthroughView) -> String {
    let step_count = view.steps.len();
    let position = view.cursor.step_index + 1;
    let (current, caption) = match view.current_step() {
        Some(step) => (render_current(step), escape_html(&step.caption)),
        None => (String::new(), String::new()),
    };
    let back_disabled = if view.cursor.step_index == 0 { " disabled" } else { "" };
    let next_disabled = if position >= step_count { " disabled" } else { "" };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>{gene} walkthrough</title></head>
<body>
<div class="walkthrough" data-session="{session}">
  <div class="summary"><strong>Gene:</strong> {gene} | <strong>Chr:</strong> {band} | <strong>Variant:</strong> {variant} | <strong>Type:</strong> {category}</div>
  <div class="hint">Click the image to step through</div>
  <div class="step">{current}</div>
  <div id="caption" class="caption">{caption}</div>
  <div class="controls">
    <button onclick="navigate('back')"{back_disabled}>Back</button>
    <span class="counter">Step {position} of {step_count}</span>
    <button onclick="navigate('next')"{next_disabled}>Next</button>
  </div>
  {gallery}
</div>
<script>
  function navigate(action) {{
    fetch('/walkthrough/{session}/' + action, {{ method: 'POST' }})
      .then(function () {{ window.location.reload(); }});
  }}
</script>
</body>
</html>"#,
        session = escape_html(&view.session_id),
        gene = escape_html(&view.cursor.gene),
        band = escape_html(&view.locus.band_label()),
        variant = escape_html(&view.cursor.variant),
        category = view.category,
        gallery = render_gallery(view),
    )
}

/// Submission form and chat panel
pub fn render_index(chat_enabled: bool) -> String {
    let chat_notice = if chat_enabled {
        ""
    } else {
        r#"<p class="notice">Chat is unavailable: no language model API key is configured.</p>"#
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>Gene Variant Visualizer</title></head>
<body>
<h1>Gene Variant Visualizer</h1>
<form id="submit-form">
  <label>Gene <input name="gene" placeholder="e.g. NFIX" required></label>
  <label>Variant <input name="variant" placeholder="e.g. c.240A&gt;G" required></label>
  <button type="submit">Run Visualization</button>
</form>
<p id="error" class="error"></p>
<section class="chat">
  <h2>Ask a question</h2>
  {chat_notice}
  <div id="transcript"></div>
  <form id="chat-form">
    <input name="question" placeholder="What does this mutation type mean?">
    <button type="submit">Ask</button>
  </form>
</section>
<script>
  var sessionId = sessionStorage.getItem('walkthrough-session');
  function post(url, body) {{
    return fetch(url, {{
      method: 'POST',
      headers: {{ 'Content-Type': 'application/json' }},
      body: JSON.stringify(body)
    }}).then(function (r) {{ return r.json(); }});
  }}
  document.getElementById('submit-form').addEventListener('submit', function (e) {{
    e.preventDefault();
    var form = new FormData(e.target);
    post('/walkthrough', {{ session_id: sessionId, gene: form.get('gene'), variant: form.get('variant') }})
      .then(function (data) {{
        if (data.error) {{ document.getElementById('error').textContent = data.error; return; }}
        sessionStorage.setItem('walkthrough-session', data.session_id);
        window.location = '/walkthrough/' + data.session_id + '/view';
      }});
  }});
  document.getElementById('chat-form').addEventListener('submit', function (e) {{
    e.preventDefault();
    if (!sessionId) {{ document.getElementById('error').textContent = 'Submit a gene and variant first.'; return; }}
    var form = new FormData(e.target);
    post('/walkthrough/' + sessionId + '/chat', {{ question: form.get('question') }})
      .then(function (data) {{
        var entry = document.createElement('p');
        entry.textContent = data.reply || data.error;
        document.getElementById('transcript').appendChild(entry);
      }});
  }});
</script>
</body>
</html>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetKey;
    use crate::models::Arm;

    fn view(step_index: usize) -> WalkthroughView {
        let image = |key: AssetKey, caption: &str| WalkthroughStep {
            key,
            asset: StepAsset::Image {
                png_base64: "iVBORw0KGgo=".to_string(),
            },
            caption: caption.to_string(),
        };
        WalkthroughView {
            session_id: "s-1".to_string(),
            cursor: SessionCursor {
                step_index,
                gene: "NFIX".to_string(),
                variant: "c.240A>G".to_string(),
            },
            locus: Locus::new("NFIX", "ENSG00000008441", "19", 58_617_616, Some(12_995_000)),
            category: MutationCategory::Missense,
            steps: vec![
                image(AssetKey::ChromosomeOverview, "All chromosomes"),
                image(AssetKey::ArmDiagram, "Arms <p & q>"),
                WalkthroughStep {
                    key: AssetKey::BandDiagram,
                    asset: StepAsset::BandDiagram {
                        chromosome: "19".to_string(),
                        start: 12_895_000,
                        end: 13_095_000,
                    },
                    caption: "Bands".to_string(),
                },
                image(AssetKey::MutationExample(MutationCategory::Missense), "Missense example"),
            ],
        }
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape_html(r#"<a href="x">'&'</a>"#), "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;");
    }

    #[test]
    fn first_step_shows_summary_and_caption() {
        let html = render_walkthrough(&view(0));
        assert!(html.contains("<strong>Chr:</strong> 19p"));
        assert!(html.contains("c.240A&gt;G"));
        assert!(html.contains(r#"<div id="caption" class="caption">All chromosomes</div>"#));
        assert!(html.contains("Step 1 of 4"));
        assert!(html.contains(r#"onclick="navigate('back')" disabled"#));
        assert!(html.contains(r#"src="data:image/png;base64,iVBORw0KGgo=" onclick="navigate('next')""#));
        assert_eq!(view(0).locus.arm, Arm::P);
    }

    #[test]
    fn captions_are_escaped() {
        let html = render_walkthrough(&view(1));
        assert!(html.contains("Arms &lt;p &amp; q&gt;"));
    }

    #[test]
    fn band_step_embeds_widget() {
        let html = render_walkthrough(&view(2));
        assert!(html.contains(r#"data-chromosome="19" data-start="12895000" data-end="13095000""#));
        assert!(html.contains("brush: 'chr19:12895000-13095000'"));
        assert!(html.contains(IDEOGRAM_SCRIPT));
        assert!(html.contains(
            r#"<div class="step-visual" onclick="navigate('next')"><div id="band-diagram""#
        ));
    }

    #[test]
    fn last_step_disables_next() {
        let html = render_walkthrough(&view(3));
        assert!(html.contains(r#"onclick="navigate('next')" disabled"#));
        assert!(html.contains("Step 4 of 4"));
    }

    #[test]
    fn gallery_has_one_entry_per_step() {
        let html = render_walkthrough(&view(1));
        for index in 0..4 {
            assert!(html.contains(&format!("navigate('select/{}')", index)));
        }
        assert_eq!(html.matches(r#"class="thumb selected""#).count(), 1);
    }

    #[test]
    fn rendering_is_pure() {
        let v = view(2);
        assert_eq!(render_walkthrough(&v), render_walkthrough(&v));
    }

    #[test]
    fn index_reports_disabled_chat() {
        assert!(render_index(false).contains("Chat is unavailable"));
        assert!(!render_index(true).contains("Chat is unavailable"));
    }
}
