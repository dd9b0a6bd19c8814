//! In-page field extraction
//!
//! The extraction runs inside the fetched page and returns a JSON object
//! matching [`crate::crawler::ExtractedFields`]. The selector set is the only
//! site-specific piece of the fetch path; swapping it adapts the crawler to a
//! different page layout.

/// Script evaluated in the page after navigation settles
pub const EXTRACT_SCRIPT: &str = r#"
(() => {
    const title = document.querySelector('h1')?.innerText || document.title;
    const description = document.querySelector('.full-text')?.innerText
        || document.querySelector('.news-text')?.innerText
        || '';
    const tags = Array.from(document.querySelectorAll('.tag-list a, .tags a'))
        .map(a => a.innerText);
    const images = Array.from(document.querySelectorAll('.gallery img, .full-content img'))
        .map(img => img.src);
    const download_links = Array.from(document.querySelectorAll('a[href*="download"], a[href*="getfile"]'))
        .map(a => a.href);

    return { title, description, tags, images, download_links };
})()
"#;
