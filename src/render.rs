//! HTML output.
//!
//! A thin layer over the metadata model; the interesting rules are about what
//! each page is allowed to contain:
//!
//! - **Site index** (`public_html/index.html`): listed galleries only,
//!   featured first.
//! - **Gallery page**: `index.html` for public galleries. For protected and
//!   encrypted galleries it is written as `{private id}.html` instead, and
//!   `index.html` becomes a login page.
//! - **Login page**: embeds the gallery id and the verification hash and
//!   nothing else derived from the gallery.
//! - **Image pages** (`{image}.html`): one per image with previous/next links.
//!
//! Whether a gallery is encrypted is passed into every image helper: encrypted
//! derivatives are ciphertext, so they are referenced through
//! `data-encrypted-url` and decrypted by `gallery.js`, never through `src`.
//!
//! HTML is generated with [maud](https://maud.lambda.xyz/); gallery `content`
//! is Markdown rendered with pulldown-cmark.

use crate::builder::BuiltGallery;
use crate::config::SiteConfig;
use crate::fsutil::{self, WriteOutcome};
use crate::layout::{self, OutputLayout};
use crate::types::{Gallery, GalleryIndex, GallerySummary, Image};
use maud::{DOCTYPE, Markup, PreEscaped, html};
use pulldown_cmark::{Parser, html as md_html};
use std::io;
use std::path::PathBuf;

const CSS: &str = include_str!("../static/style.css");
const JS: &str = include_str!("../static/gallery.js");

const CSS_FILE: &str = "style.css";
const JS_FILE: &str = "gallery.js";

// ============================================================================
// Writing
// ============================================================================

/// Pages written for one gallery.
#[derive(Debug, Default)]
pub struct RenderedPages {
    /// Every page this gallery owns; joins the reconciler's expected set.
    pub pages: Vec<PathBuf>,
    pub written: usize,
}

/// Render and write every page of a built gallery.
pub fn write_gallery_pages(
    layout: &OutputLayout,
    site: &SiteConfig,
    built: &BuiltGallery,
) -> io::Result<RenderedPages> {
    let gallery = &built.gallery;
    let mut out = RenderedPages::default();
    let mut write = |path: PathBuf, markup: Markup| -> io::Result<()> {
        if fsutil::write_if_changed(&path, markup.into_string().as_bytes())? == WriteOutcome::Written
        {
            out.written += 1;
        }
        out.pages.push(path);
        Ok(())
    };

    match (&built.access, &gallery.private_gallery_id_hash) {
        (Some(access), Some(hash)) => {
            write(
                layout.private_gallery_page(&gallery.id, access.private_id.as_str()),
                render_gallery_page(site, gallery, true),
            )?;
            write(
                layout.gallery_page(&gallery.id),
                render_login_page(site, &gallery.id, hash),
            )?;
        }
        _ => write(
            layout.gallery_page(&gallery.id),
            render_gallery_page(site, gallery, false),
        )?,
    }

    for (idx, image) in gallery.images.iter().enumerate() {
        let prev = idx.checked_sub(1).and_then(|i| gallery.images.get(i));
        let next = gallery.images.get(idx + 1);
        write(
            layout.image_page(&gallery.id, &image.id),
            render_image_page(site, gallery, image, prev, next),
        )?;
    }

    Ok(out)
}

/// Write the site index. Returns whether the file changed.
pub fn write_site_index(
    layout: &OutputLayout,
    site: &SiteConfig,
    index: &GalleryIndex,
) -> io::Result<WriteOutcome> {
    fsutil::write_if_changed(
        &layout.site_index(),
        render_site_index(site, index).into_string().as_bytes(),
    )
}

/// Write the stylesheet and script. Returns how many files changed.
pub fn write_static_assets(layout: &OutputLayout) -> io::Result<usize> {
    let dir = layout.static_dir();
    let mut written = 0;
    for (name, body) in [(CSS_FILE, CSS), (JS_FILE, JS)] {
        if fsutil::write_if_changed(&dir.join(name), body.as_bytes())? == WriteOutcome::Written {
            written += 1;
        }
    }
    Ok(written)
}

// ============================================================================
// HTML Components
// ============================================================================

/// The base document. `body_data` sets `data-*` attributes on `<body>` that
/// `gallery.js` reads.
fn base_document(
    site: &SiteConfig,
    title: &str,
    body_data: BodyData<'_>,
    content: Markup,
) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                @if body_data.noindex {
                    meta name="robots" content="noindex";
                }
                title { (title) }
                link rel="stylesheet" href=(layout::static_url(CSS_FILE));
            }
            body
                data-encrypted-gallery=[body_data.encrypted_gallery]
                data-private-page=[body_data.private_page.then_some("true")]
            {
                header.site-header {
                    nav.breadcrumb {
                        a href="/" { (site.site_name) }
                    }
                }
                (content)
                @if !site.author.is_empty() {
                    footer.site-footer { "© " (site.author) }
                }
                script src=(layout::static_url(JS_FILE)) defer {}
            }
        }
    }
}

#[derive(Default, Clone, Copy)]
struct BodyData<'a> {
    encrypted_gallery: Option<&'a str>,
    private_page: bool,
    noindex: bool,
}

impl<'a> BodyData<'a> {
    fn for_gallery(gallery: &'a Gallery, private_page: bool) -> Self {
        Self {
            encrypted_gallery: gallery.encrypted.then_some(gallery.id.as_str()),
            private_page,
            noindex: gallery.unlisted || gallery.password_protected,
        }
    }
}

/// An `<img>` for a derivative. Encrypted derivatives carry their URL in
/// `data-encrypted-url` and the image id the client needs for the IV.
fn derivative_img(encrypted: bool, image_id: &str, url: &str, alt: &str, lazy: bool) -> Markup {
    let loading = lazy.then_some("lazy");
    html! {
        @if encrypted {
            img data-encrypted-url=(url) data-image-id=(image_id) alt=(alt) loading=[loading];
        } @else {
            img src=(url) alt=(alt) loading=[loading];
        }
    }
}

fn markdown(text: &str) -> String {
    let mut out = String::new();
    md_html::push_html(&mut out, Parser::new(text));
    out
}

// ============================================================================
// Page Renderers
// ============================================================================

/// Site index: listed galleries, featured first, otherwise in index order.
pub fn render_site_index(site: &SiteConfig, index: &GalleryIndex) -> Markup {
    let mut listed: Vec<&GallerySummary> = index.galleries.iter().filter(|g| !g.unlisted).collect();
    listed.sort_by_key(|g| !g.featured);

    let content = html! {
        main.index-page {
            div.gallery-grid {
                @for g in &listed {
                    a.gallery-card.featured[g.featured] href=(layout::gallery_url(&g.id)) {
                        @if let Some(cover) = &g.cover {
                            (derivative_img(g.encrypted, &cover.id, &cover.thumbnail_path, &g.title, true))
                        }
                        span.gallery-title { (g.title) }
                        span.gallery-meta {
                            (g.display_date)
                            @if !g.location.is_empty() { " · " (g.location) }
                        }
                    }
                }
            }
        }
    };

    base_document(site, &site.site_name, BodyData::default(), content)
}

/// Gallery page with its thumbnail grid. `private_page` marks the copy named
/// by the private gallery id.
pub fn render_gallery_page(site: &SiteConfig, gallery: &Gallery, private_page: bool) -> Markup {
    let content = html! {
        main.gallery-page {
            header.gallery-header {
                h1 { (gallery.title) }
                p.gallery-meta {
                    (gallery.display_date)
                    @if !gallery.location.is_empty() { " · " (gallery.location) }
                }
                @if !gallery.description.is_empty() {
                    p.gallery-description { (gallery.description) }
                }
            }
            @if !gallery.content.is_empty() {
                section.gallery-content { (PreEscaped(markdown(&gallery.content))) }
            }
            div.thumbnail-grid {
                @for image in &gallery.images {
                    a.thumb-link href=(image.url) {
                        (derivative_img(gallery.encrypted, &image.id, &image.thumbnail_path, &image.title, true))
                    }
                }
            }
        }
    };

    base_document(
        site,
        &gallery.title,
        BodyData::for_gallery(gallery, private_page),
        content,
    )
}

/// Login page. Carries the gallery id and verification hash only.
pub fn render_login_page(site: &SiteConfig, gallery_id: &str, verification_hash: &str) -> Markup {
    let content = html! {
        main.login {
            h1 { "Protected gallery" }
            form.login-form data-gallery-id=(gallery_id) data-verification-hash=(verification_hash) {
                input type="password" name="password" placeholder="Password" autocomplete="current-password" autofocus;
                p.error {}
                button type="submit" { "Open" }
            }
        }
    };
    let data = BodyData {
        noindex: true,
        ..BodyData::default()
    };
    base_document(site, "Protected gallery", data, content)
}

/// One image with previous/next links. Back links of protected galleries go
/// to the login page, so image pages never reveal the private page name.
pub fn render_image_page(
    site: &SiteConfig,
    gallery: &Gallery,
    image: &Image,
    prev: Option<&Image>,
    next: Option<&Image>,
) -> Markup {
    let back = layout::gallery_url(&gallery.id);
    let content = html! {
        main.image-page {
            figure.image-frame {
                (derivative_img(gallery.encrypted, &image.id, &image.path, &image.title, false))
                figcaption {
                    h1 { (image.title) }
                    @if !image.caption.is_empty() { p { (image.caption) } }
                }
            }
            nav.image-nav {
                @if let Some(p) = prev {
                    a rel="prev" href=(p.url) { "← " (p.title) }
                } @else { span {} }
                a href=(back) { (gallery.title) }
                @if let Some(n) = next {
                    a rel="next" href=(n.url) { (n.title) " →" }
                } @else { span {} }
            }
            @if !image.exif.is_empty() {
                dl.exif {
                    @for (name, value) in &image.exif {
                        dt { (name) }
                        dd { (value) }
                    }
                }
            }
        }
    };

    base_document(
        site,
        &format!("{} - {}", gallery.title, image.title),
        BodyData::for_gallery(gallery, false),
        content,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CoverRef;
    use std::collections::BTreeMap;

    fn image(id: &str, title: &str) -> Image {
        Image {
            id: id.into(),
            filename: format!("{title}.jpg"),
            url: layout::image_url("g", id),
            path: format!("/galleries/g/full/{id}.jpg"),
            thumbnail_path: format!("/galleries/g/thumbnail/{id}.jpg"),
            cover_path: format!("/galleries/g/cover/{id}.jpg"),
            title: title.into(),
            caption: String::new(),
            tags: vec![],
            lat: None,
            lon: None,
            exif: BTreeMap::new(),
        }
    }

    fn gallery(encrypted: bool) -> Gallery {
        let images = vec![image("aaa", "Dawn"), image("bbb", "Noon"), image("ccc", "Dusk")];
        Gallery {
            id: "g".into(),
            title: "Summer <Evening>".into(),
            date: "2024:07:15 00:00:00".into(),
            display_date: "Monday, July 15, 2024".into(),
            location: "Lisbon".into(),
            description: String::new(),
            content: "Some *markdown*".into(),
            tags: vec![],
            featured: false,
            unlisted: encrypted,
            password_protected: encrypted,
            encrypted,
            private_gallery_id_hash: encrypted.then(|| "4ebc62cf".to_string()),
            cover: images.first().map(CoverRef::from),
            last_updated: String::new(),
            images,
        }
    }

    fn summary(id: &str, featured: bool, unlisted: bool) -> GallerySummary {
        let mut g = gallery(false);
        g.id = id.into();
        g.title = id.into();
        g.featured = featured;
        g.unlisted = unlisted;
        GallerySummary::from(&g)
    }

    #[test]
    fn base_document_includes_doctype() {
        let doc = render_login_page(&SiteConfig::default(), "g", "h").into_string();
        assert!(doc.starts_with("<!DOCTYPE html>"));
    }

    #[test]
    fn gallery_page_escapes_and_renders_markdown() {
        let html = render_gallery_page(&SiteConfig::default(), &gallery(false), false).into_string();
        assert!(html.contains("Summer &lt;Evening&gt;"));
        assert!(html.contains("<em>markdown</em>"));
        assert!(html.contains(r#"src="/galleries/g/thumbnail/aaa.jpg""#));
        assert!(!html.contains("data-encrypted-url"));
    }

    #[test]
    fn encrypted_gallery_uses_data_encrypted_url() {
        let html = render_gallery_page(&SiteConfig::default(), &gallery(true), true).into_string();
        assert!(html.contains(r#"data-encrypted-url="/galleries/g/thumbnail/aaa.jpg""#));
        assert!(html.contains(r#"data-image-id="aaa""#));
        assert!(!html.contains(r#"src="/galleries/g/thumbnail"#));
        assert!(html.contains(r#"data-encrypted-gallery="g""#));
        assert!(html.contains(r#"data-private-page="true""#));
    }

    #[test]
    fn encrypted_image_page_uses_data_encrypted_url() {
        let g = gallery(true);
        let html = render_image_page(&SiteConfig::default(), &g, &g.images[0], None, None)
            .into_string();
        assert!(html.contains(r#"data-encrypted-url="/galleries/g/full/aaa.jpg""#));
        assert!(!html.contains(r#"src="/galleries/g/full"#));
    }

    #[test]
    fn login_page_embeds_id_and_hash_only() {
        let html = render_login_page(&SiteConfig::default(), "20240715", "4ebc62cf").into_string();
        assert!(html.contains(r#"data-gallery-id="20240715""#));
        assert!(html.contains(r#"data-verification-hash="4ebc62cf""#));
        assert!(html.contains(r#"content="noindex""#));
        assert!(!html.contains("<img"));
    }

    #[test]
    fn image_page_links_neighbours() {
        let g = gallery(false);
        let html = render_image_page(
            &SiteConfig::default(),
            &g,
            &g.images[1],
            Some(&g.images[0]),
            Some(&g.images[2]),
        )
        .into_string();
        assert!(html.contains(r#"rel="prev" href="/galleries/g/aaa.html""#));
        assert!(html.contains(r#"rel="next" href="/galleries/g/ccc.html""#));
        assert!(html.contains(r#"href="/galleries/g/""#));
    }

    #[test]
    fn site_index_lists_featured_first_and_hides_unlisted() {
        let index = GalleryIndex::from_summaries(vec![
            summary("plain", false, false),
            summary("star", true, false),
            summary("hidden", false, true),
        ]);
        let html = render_site_index(&SiteConfig::default(), &index).into_string();
        let star = html.find("/galleries/star/").unwrap();
        let plain = html.find("/galleries/plain/").unwrap();
        assert!(star < plain);
        assert!(!html.contains("/galleries/hidden/"));
    }

    #[test]
    fn footer_shows_author() {
        let site = SiteConfig {
            author: "Ana".into(),
            ..SiteConfig::default()
        };
        let html = render_login_page(&site, "g", "h").into_string();
        assert!(html.contains("© Ana"));
    }
}
