//! HTML for the single-page front-end.

use crate::upload::UploadPolicy;

const PAGE_STYLE: &str = r#"
    body { font-family: system-ui, sans-serif; max-width: 760px; margin: 2rem auto; padding: 0 1rem; color: #222; }
    h1 { font-size: 1.6rem; margin-bottom: 0.25rem; }
    .hint { color: #666; font-size: 0.9rem; }
    #drop-zone { border: 2px dashed #aaa; border-radius: 8px; padding: 2rem; text-align: center; cursor: pointer; }
    #drop-zone.dragging { border-color: #3b82f6; background: #eff6ff; }
    #preview { max-width: 100%; max-height: 320px; margin-top: 1rem; display: none; }
    #progress-track { height: 10px; background: #e5e7eb; border-radius: 5px; overflow: hidden; margin-top: 1rem; }
    #progress-bar { height: 100%; width: 0; background: #3b82f6; transition: width 0.2s; }
    #progress-bar.indeterminate { width: 100%; opacity: 0.4; }
    #progress-label { font-size: 0.85rem; color: #444; margin-top: 0.25rem; }
    #result { white-space: pre-wrap; background: #f9fafb; border: 1px solid #e5e7eb; border-radius: 6px; padding: 1rem; min-height: 4rem; }
    #error { color: #b91c1c; }
    button { padding: 0.5rem 1.25rem; font-size: 1rem; margin-top: 1rem; }
"#;

const PAGE_SCRIPT: &str = r#"
(function () {
    const zone = document.getElementById('drop-zone');
    const input = document.getElementById('file-input');
    const preview = document.getElementById('preview');
    const button = document.getElementById('process');
    const bar = document.getElementById('progress-bar');
    const label = document.getElementById('progress-label');
    const resultBlock = document.getElementById('result-block');
    const result = document.getElementById('result');
    const error = document.getElementById('error');
    let polling = null;

    async function select(file) {
        if (!file) return;
        error.textContent = '';
        const resp = await fetch('/api/image', {
            method: 'PUT',
            headers: { 'Content-Type': file.type || 'application/octet-stream' },
            body: file,
        });
        if (!resp.ok) {
            const body = await resp.json().catch(() => ({}));
            error.textContent = body.error || ('Upload failed: ' + resp.status);
            return;
        }
        preview.src = '/api/image?t=' + Date.now();
        preview.style.display = 'block';
        refresh();
    }

    function render(status) {
        const p = status.progress;
        bar.classList.toggle('indeterminate', p.indeterminate);
        bar.style.width = p.indeterminate ? '' : p.percent + '%';
        label.textContent = p.display_label + (p.indeterminate ? '' : ' (' + Math.round(p.percent) + '%)');
        result.textContent = status.text;
        resultBlock.hidden = status.text === '';
        if (status.error) error.textContent = status.error;
        button.disabled = !status.has_image || status.state === 'busy';
        return status.state;
    }

    async function refresh() {
        const resp = await fetch('/api/status');
        if (resp.ok) return render(await resp.json());
    }

    function startPolling() {
        stopPolling();
        polling = setInterval(refresh, 200);
    }

    function stopPolling() {
        if (polling) clearInterval(polling);
        polling = null;
    }

    button.addEventListener('click', async () => {
        error.textContent = '';
        button.disabled = true;
        startPolling();
        const resp = await fetch('/api/recognize', { method: 'POST' });
        if (!resp.ok) {
            const body = await resp.json().catch(() => ({}));
            error.textContent = body.error || ('Recognition failed: ' + resp.status);
        }
        stopPolling();
        await refresh();
    });

    zone.addEventListener('click', () => input.click());
    input.addEventListener('change', () => select(input.files[0]));
    zone.addEventListener('dragover', (e) => { e.preventDefault(); zone.classList.add('dragging'); });
    zone.addEventListener('dragleave', () => zone.classList.remove('dragging'));
    zone.addEventListener('drop', (e) => {
        e.preventDefault();
        zone.classList.remove('dragging');
        select(e.dataTransfer.files[0]);
    });

    refresh();
})();
"#;

/// Render the upload, preview, progress and result page.
pub fn index_page(policy: &UploadPolicy) -> String {
    let accept = policy.accepted_types().join(",");
    let extensions = policy
        .accepted_types()
        .iter()
        .map(|t| t.rsplit('/').next().unwrap_or(t).to_uppercase())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Textlift</title>
    <style>{style}</style>
</head>
<body>
    <h1>Textlift</h1>
    <p class="hint">Extract text from an image.</p>
    <div id="drop-zone">
        <p>Click to upload or drag and drop</p>
        <p class="hint">{extensions} up to {limit}</p>
        <input type="file" id="file-input" accept="{accept}" hidden>
    </div>
    <img id="preview" alt="Selected image">
    <button id="process" disabled>Process Image</button>
    <div id="progress-track"><div id="progress-bar"></div></div>
    <div id="progress-label">Idle</div>
    <section id="result-block" hidden>
        <h2>Result</h2>
        <div id="result"></div>
    </section>
    <p id="error"></p>
    <script>{script}</script>
</body>
</html>"#,
        style = PAGE_STYLE,
        extensions = html_escape(&extensions),
        limit = format_size(policy.max_bytes()),
        accept = html_escape(&accept),
        script = PAGE_SCRIPT,
    )
}

/// Escape HTML special characters.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Format a byte count the way the upload hint shows it.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB && bytes % MB == 0 {
        format!("{}MB", bytes / MB)
    } else if bytes >= MB {
        format!("{:.1}MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{}KB", bytes / KB)
    } else {
        format!("{} bytes", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(5 * 1024 * 1024), "5MB");
        assert_eq!(format_size(1536 * 1024), "1.5MB");
        assert_eq!(format_size(2048), "2KB");
        assert_eq!(format_size(12), "12 bytes");
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("<a href=\"x\">"), "&lt;a href=&quot;x&quot;&gt;");
    }

    #[test]
    fn test_index_page_lists_policy() {
        let page = index_page(&UploadPolicy::default());
        assert!(page.contains("PNG, JPG, JPEG up to 5MB"));
        assert!(page.contains("accept=\"image/png,image/jpg,image/jpeg\""));
        assert!(page.contains("Process Image"));
    }
}
