//! Viewer module - generates the live dual view page for a session.
//!
//! The page fetches `frames/{index}` for the panel layout and the PNGs it
//! names, all relative to `/sessions/{id}/view`.

use crate::export::{html_escape, PANEL_STYLES};
use crate::view::PLACEHOLDER_TEXT;

use super::handlers::SessionInfo;

/// Generate the live viewer page for a session.
pub fn generate_viewer_html(info: &SessionInfo) -> String {
    let escaped_id = html_escape(&info.id);
    let escaped_volume = html_escape(&info.volume);
    let max = info.slice_count.saturating_sub(1);
    let disabled = if info.slice_count <= 1 { " disabled" } else { "" };

    format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>CorView - {escaped_volume}</title>
    <style>{styles}
        .frame {{ aspect-ratio: {width} / {height}; }}
        .meta {{ color: rgba(255, 255, 255, 0.6); font-size: 12px; margin-bottom: 16px; }}
    </style>
</head>
<body>
    <h1>{escaped_volume}</h1>
    <div class="meta">
        {escaped_id} · <span>{slice_count}</span> slices · {width} × {height} px ·
        <span id="registrations">{registrations}</span> registered
    </div>
    <div class="panels">
        <div class="panel">
            <h2 id="slice-title"></h2>
            <div class="frame"><img id="slice" alt="volume slice"></div>
        </div>
        <div class="panel">
            <h2 id="image-title"></h2>
            <div class="frame">
                <img id="image" alt="registered image" class="hidden">
                <div id="placeholder" class="placeholder">{placeholder}</div>
            </div>
        </div>
    </div>
    <div class="controls">
        <label for="slider">Slice number</label>
        <input type="range" id="slider" min="0" max="{max}" step="1" value="0"{disabled}>
        <span id="slider-value">0</span>
    </div>

    <script>
        const slider = document.getElementById('slider');
        const sliceImg = document.getElementById('slice');
        const sliceTitle = document.getElementById('slice-title');
        const image = document.getElementById('image');
        const imageTitle = document.getElementById('image-title');
        const placeholder = document.getElementById('placeholder');
        const sliderValue = document.getElementById('slider-value');
        let latest = 0;

        async function show(index) {{
            latest = index;
            const response = await fetch('frames/' + index);
            if (!response.ok) return;
            const frame = await response.json();
            // Drop responses overtaken by a newer slider position
            if (frame.index !== latest) return;

            sliceImg.src = 'slices/' + frame.index + '.png';
            sliceTitle.textContent = frame.slice_title;
            sliderValue.textContent = frame.index;

            if (frame.image.kind === 'registered') {{
                image.src = 'images/' + encodeURIComponent(frame.image.id) + '.png';
                image.classList.remove('hidden');
                placeholder.classList.add('hidden');
                imageTitle.textContent = frame.image.caption;
            }} else {{
                image.classList.add('hidden');
                image.removeAttribute('src');
                placeholder.classList.remove('hidden');
                placeholder.textContent = frame.image.message;
                imageTitle.textContent = '';
            }}
        }}

        slider.addEventListener('input', (event) => show(parseInt(event.target.value, 10)));
        show(0);
    </script>
</body>
</html>
"##,
        escaped_volume = escaped_volume,
        escaped_id = escaped_id,
        styles = PANEL_STYLES,
        width = info.width,
        height = info.height,
        slice_count = info.slice_count,
        registrations = info.registrations,
        placeholder = html_escape(PLACEHOLDER_TEXT),
        max = max,
        disabled = disabled,
    )
}
