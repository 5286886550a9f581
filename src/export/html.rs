//! The exported HTML document.
//!
//! The document is self-contained: styles, script and all pixel data are
//! inline, and nothing is fetched at view time. The payload sits in a
//! `<script type="application/json">` element, which [`Artifact::parse`] reads
//! back for inspection.

use std::path::Path;

use crate::error::{ArtifactParseError, EncodeError, IoError};

use super::payload::ArtifactPayload;

/// Id of the element holding the JSON payload.
pub const PAYLOAD_ELEMENT_ID: &str = "corview-data";

const PAYLOAD_OPEN: &str = r#"<script type="application/json" id="corview-data">"#;
const SCRIPT_CLOSE: &str = "</script>";

/// Escape HTML special characters to prevent markup injection.
pub(crate) fn html_escape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#x27;"),
            _ => result.push(c),
        }
    }
    result
}

/// Styles shared by the exported artifact and the live viewer.
pub(crate) const PANEL_STYLES: &str = r#"
        * { margin: 0; padding: 0; box-sizing: border-box; }
        body {
            background: #0f0f0f;
            color: #fff;
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Oxygen, Ubuntu, sans-serif;
            padding: 24px;
        }
        h1 { font-size: 18px; font-weight: 600; margin-bottom: 16px; }
        .panels { display: flex; gap: 24px; flex-wrap: wrap; }
        .panel {
            background: rgba(255, 255, 255, 0.04);
            border: 1px solid rgba(255, 255, 255, 0.1);
            border-radius: 8px;
            padding: 12px;
        }
        .panel h2 { font-size: 14px; font-weight: 500; margin-bottom: 8px; word-break: break-all; }
        .frame { width: 480px; position: relative; background: #000; }
        .frame img { width: 100%; height: 100%; object-fit: fill; image-rendering: pixelated; display: block; }
        .placeholder {
            position: absolute; inset: 0;
            display: flex; align-items: center; justify-content: center;
            color: rgba(255, 255, 255, 0.5); font-size: 13px;
        }
        .controls { margin-top: 16px; display: flex; align-items: center; gap: 12px; font-size: 13px; }
        .controls input { width: 480px; }
        .hidden { display: none; }
"#;

/// Serialize `payload` for a `<script>` element.
///
/// `<` is emitted as the JSON escape `\u003c`, so no string content can
/// close the element.
pub fn embed_payload(payload: &ArtifactPayload) -> Result<String, EncodeError> {
    let json = serde_json::to_string(payload).map_err(|e| EncodeError {
        what: "artifact payload".to_string(),
        message: e.to_string(),
    })?;
    Ok(json.replace('<', "\\u003c"))
}

/// Render the complete artifact document.
pub fn render_artifact(payload: &ArtifactPayload) -> Result<String, EncodeError> {
    let data = embed_payload(payload)?;
    let title = html_escape(&payload.title);
    let disabled = if payload.slice_count <= 1 { " disabled" } else { "" };
    let max = payload.slice_count.saturating_sub(1);

    Ok(format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>{styles}
        .frame {{ aspect-ratio: {width} / {height}; }}
    </style>
</head>
<body>
    <h1>{title}</h1>
    <div class="panels">
        <div class="panel">
            <h2 id="slice-title"></h2>
            <div class="frame"><img id="slice" alt="volume slice"></div>
        </div>
        <div class="panel">
            <h2 id="image-title"></h2>
            <div class="frame">
                <img id="image" alt="registered image" class="hidden">
                <div id="placeholder" class="placeholder"></div>
            </div>
        </div>
    </div>
    <div class="controls">
        <label for="slider">Slice number</label>
        <input type="range" id="slider" min="0" max="{max}" step="1" value="0"{disabled}>
        <span id="slider-value">0</span>
    </div>

    {payload_open}{data}{script_close}
    <script>
        const data = JSON.parse(document.getElementById('{payload_id}').textContent);
        const slider = document.getElementById('slider');
        const sliceImg = document.getElementById('slice');
        const sliceTitle = document.getElementById('slice-title');
        const image = document.getElementById('image');
        const imageTitle = document.getElementById('image-title');
        const placeholder = document.getElementById('placeholder');
        const sliderValue = document.getElementById('slider-value');

        // Both panels change together; a miss always clears the image panel
        function show(index) {{
            sliceImg.src = data.slices[index];
            sliceTitle.textContent = 'CT slice ' + index;
            sliderValue.textContent = index;

            const hit = data.lookup[index];
            if (hit === null || hit === undefined) {{
                image.classList.add('hidden');
                image.removeAttribute('src');
                placeholder.classList.remove('hidden');
                placeholder.textContent = data.placeholder;
                imageTitle.textContent = '';
            }} else {{
                const entry = data.images[hit];
                image.src = entry.src;
                image.classList.remove('hidden');
                placeholder.classList.add('hidden');
                imageTitle.textContent = entry.caption;
            }}
        }}

        slider.addEventListener('input', (event) => show(parseInt(event.target.value, 10)));
        show(0);
    </script>
</body>
</html>
"##,
        title = title,
        styles = PANEL_STYLES,
        width = payload.width,
        height = payload.height,
        max = max,
        disabled = disabled,
        payload_open = PAYLOAD_OPEN,
        data = data,
        script_close = SCRIPT_CLOSE,
        payload_id = PAYLOAD_ELEMENT_ID,
    ))
}

// =============================================================================
// Artifact
// =============================================================================

/// An exported document read back from disk or memory.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub payload: ArtifactPayload,
}

impl Artifact {
    /// Recover the payload embedded in `html`.
    pub fn parse(html: &str) -> Result<Self, ArtifactParseError> {
        let start = html
            .find(PAYLOAD_OPEN)
            .ok_or(ArtifactParseError::MissingPayload)?
            + PAYLOAD_OPEN.len();
        let len = html[start..]
            .find(SCRIPT_CLOSE)
            .ok_or(ArtifactParseError::MissingPayload)?;

        let payload = serde_json::from_str(&html[start..start + len])
            .map_err(|e| ArtifactParseError::InvalidPayload(e.to_string()))?;
        Ok(Self { payload })
    }

    /// Read and parse the artifact at `path`.
    pub fn read(path: impl AsRef<Path>) -> Result<Self, ArtifactParseError> {
        let path = path.as_ref();
        let html = std::fs::read_to_string(path).map_err(|e| IoError::from_std(path, e))?;
        Self::parse(&html)
    }
}
