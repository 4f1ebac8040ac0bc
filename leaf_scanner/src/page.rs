use crate::treatment::{Recommendation, Treatment};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use leaf_prediction::Prediction;
use std::{fmt::Write, path::Path};

const TITLE: &str = "ದ್ರಾಕ್ಷಿ ಎಲೆ ರೋಗ ಸ್ಕ್ಯಾನರ್";
const DESCRIPTION: &str = "ಅದರ ಆರೋಗ್ಯವನ್ನು ಪತ್ತೆಹಚ್ಚಲು ಮತ್ತು ಚಿಕಿತ್ಸೆಯ ಶಿಫಾರಸುಗಳನ್ನು ಪಡೆಯಲು ದ್ರಾಕ್ಷಿ ಎಲೆಯ ಚಿತ್ರವನ್ನು ಅಪ್‌ಲೋಡ್ ಮಾಡಿ.";
const SCAN_LABEL: &str = "ಚಿತ್ರವನ್ನು ಸ್ಕ್ಯಾನ್ ಮಾಡಿ";
const PREDICTED_LABEL: &str = "ಊಹಿಸಿದ ರೋಗ";
const CHEMICAL_HEADING: &str = "ರಾಸಾಯನಿಕ ಗೊಬ್ಬರಗಳ ಚಿಕಿತ್ಸೆಗಳು:-";
const ORGANIC_HEADING: &str = "ಸಾವಯವ ಚಿಕಿತ್ಸೆ:-";
const MODEL_UNAVAILABLE: &str = "Model could not be loaded. Please check if the model file exists.";

pub const ACCEPTED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

const STYLE: &str = r#"
body { font-family: sans-serif; margin: 0; background-size: cover; background-position: center; background-repeat: no-repeat; background-attachment: fixed; }
.container { max-width: 600px; margin: 50px auto; background-color: rgba(255, 255, 255, 0.9); color: #333; padding: 20px; border-radius: 10px; box-shadow: 0 4px 10px rgba(0, 0, 0, 0.2); text-align: center; }
.title { color: #4CAF50; font-size: 2.5rem; margin-bottom: 20px; }
.description { font-size: 1.2rem; margin-bottom: 30px; color: #555; }
.upload-section { margin: 20px 0; }
.upload-section button { background-color: #4CAF50; color: #fff; border: none; padding: 10px 20px; border-radius: 5px; font-size: 1rem; cursor: pointer; }
.preview { max-width: 100%; margin-top: 20px; border-radius: 5px; }
.result-box { margin-top: 20px; padding: 15px; background-color: #f4f4f4; color: #333; border-radius: 5px; font-size: 18px; border: 2px solid #4CAF50; }
.error-box { margin-top: 20px; padding: 15px; background-color: #fdecea; color: #b71c1c; border-radius: 5px; border: 2px solid #e57373; }
.treatment-box { margin-top: 20px; text-align: left; font-size: 16px; line-height: 1.6; background-color: rgba(255, 255, 255, 0.95); padding: 20px; border-radius: 10px; border-left: 5px solid #4CAF50; }
.treatment-list { margin: 10px 0; padding-left: 20px; }
.treatment-list li { margin: 8px 0; }
.youtube-link { color: #4CAF50; text-decoration: none; font-weight: bold; }
.youtube-link:hover { color: #388E3C; }
.healthy-message { color: #4CAF50; font-size: 1.3rem; font-weight: bold; text-align: center; padding: 20px; background-color: #e8f5e8; border-radius: 10px; border: 2px solid #4CAF50; }
"#;

/// Static decoration shared by every render.
#[derive(Debug, Default)]
pub struct PageAssets {
    background: Option<String>,
}

impl PageAssets {
    /// A missing or unreadable background only drops the decoration.
    pub fn load(background_image: Option<&Path>) -> Self {
        let background = background_image.and_then(|path| match std::fs::read(path) {
            Ok(data) => Some(data_uri(mime_for(path), &data)),
            Err(e) => {
                tracing::warn!("Background image {:?} not loaded: {}", path, e);
                None
            }
        });

        Self { background }
    }
}

pub enum ScanView<'a> {
    Form,
    ModelUnavailable,
    Failed(String),
    Scanned {
        preview: Option<String>,
        prediction: Prediction,
        recommendation: Option<Recommendation<'a>>,
    },
}

pub fn data_uri(mime: &str, data: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(data))
}

pub fn extension(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

pub fn is_accepted(file_name: &str) -> bool {
    extension(file_name).is_some_and(|ext| ACCEPTED_EXTENSIONS.contains(&ext.as_str()))
}

pub fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        _ => "image/jpeg",
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

pub fn render_page(assets: &PageAssets, view: &ScanView<'_>) -> String {
    let mut html = String::new();
    let body_style = assets
        .background
        .as_ref()
        .map(|uri| format!(" style=\"background-image: url('{}')\"", uri))
        .unwrap_or_default();

    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html lang=\"kn\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{TITLE}</title>\n<style>{STYLE}</style>\n</head>\n<body{body_style}>\n\
         <div class=\"container\">\n<h1 class=\"title\">{TITLE}</h1>\n\
         <p class=\"description\">{DESCRIPTION}</p>\n"
    );

    if matches!(view, ScanView::ModelUnavailable) {
        let _ = write!(html, "<div class=\"error-box\">{}</div>\n", MODEL_UNAVAILABLE);
    } else {
        render_form(&mut html);
    }

    match view {
        ScanView::Form | ScanView::ModelUnavailable => {}
        ScanView::Failed(reason) => {
            let _ = write!(
                html,
                "<div class=\"error-box\">Error processing image: {}</div>\n",
                escape_html(reason)
            );
        }
        ScanView::Scanned {
            preview,
            prediction,
            recommendation,
        } => {
            if let Some(uri) = preview {
                let _ = write!(
                    html,
                    "<img class=\"preview\" src=\"{}\" alt=\"Uploaded Image\">\n",
                    uri
                );
            }
            let _ = write!(
                html,
                "<div class=\"result-box\"><strong>{}: {}</strong><br>\
                 <small>Confidence: {}</small></div>\n",
                PREDICTED_LABEL,
                prediction.category,
                format_confidence(prediction.confidence)
            );
            match recommendation {
                Some(Recommendation::Treatment(treatment)) => render_treatment(&mut html, treatment),
                Some(Recommendation::Healthy(message)) => {
                    let _ = write!(
                        html,
                        "<div class=\"healthy-message\"><h4>{}</h4></div>\n",
                        escape_html(message)
                    );
                }
                None => {}
            }
        }
    }

    html.push_str("</div>\n</body>\n</html>\n");
    html
}

/// Percentage with two decimals, e.g. `97.53%`.
pub fn format_confidence(confidence: f32) -> String {
    format!("{:.2}%", confidence * 100.0)
}

fn render_form(html: &mut String) {
    let accept = ACCEPTED_EXTENSIONS
        .iter()
        .map(|ext| format!(".{}", ext))
        .collect::<Vec<_>>()
        .join(",");
    let _ = write!(
        html,
        "<form class=\"upload-section\" action=\"/scan\" method=\"post\" enctype=\"multipart/form-data\">\n\
         <input type=\"file\" name=\"image\" accept=\"{accept}\" required>\n\
         <button type=\"submit\">{SCAN_LABEL}</button>\n</form>\n"
    );
}

fn render_treatment(html: &mut String, treatment: &Treatment) {
    let _ = write!(
        html,
        "<div class=\"treatment-box\">\n<h1>{}</h1>\n<h3>{}</h3>\n",
        escape_html(&treatment.title),
        escape_html(&treatment.heading)
    );
    for (heading, items) in [
        (CHEMICAL_HEADING, &treatment.chemical),
        (ORGANIC_HEADING, &treatment.organic),
    ] {
        if items.is_empty() {
            continue;
        }
        let _ = write!(html, "<h4>{}</h4>\n<ul class=\"treatment-list\">\n", heading);
        for item in items {
            let _ = write!(html, "<li>{}</li>\n", escape_html(item));
        }
        html.push_str("</ul>\n");
    }
    if let Some(video) = &treatment.video {
        let _ = write!(
            html,
            "<p><a href=\"{}\" target=\"_blank\" class=\"youtube-link\">{}</a></p>\n",
            escape_html(&video.url),
            escape_html(&video.label)
        );
    }
    html.push_str("</div>\n");
}
