//! HTML fixtures shaped like the article-list CMS used by the scraped sites.

pub(crate) struct Item<'a> {
    pub href: &'a str,
    pub title: Option<&'a str>,
    pub summary: Option<&'a str>,
    pub thumb_style: Option<&'a str>,
}

impl<'a> Item<'a> {
    pub fn new(href: &'a str, title: &'a str, summary: &'a str) -> Self {
        Self {
            href,
            title: Some(title),
            summary: Some(summary),
            thumb_style: None,
        }
    }

    pub fn untitled(href: &'a str, summary: &'a str) -> Self {
        Self {
            href,
            title: None,
            summary: Some(summary),
            thumb_style: None,
        }
    }

    pub fn with_thumb(mut self, style: &'a str) -> Self {
        self.thumb_style = Some(style);
        self
    }
}

pub(crate) fn rookie_listing(items: &[Item<'_>], last_page: Option<u32>) -> String {
    let mut html = String::from(
        r#"<html><body><div id="sections"><section id="section-list"><ul class="type1">"#,
    );
    for item in items {
        html.push_str("<li>");
        if let Some(style) = item.thumb_style {
            html.push_str(&format!(
                r#"<a href="{}" class="thumb"><span class="image" style="{}"></span></a>"#,
                item.href, style
            ));
        }
        html.push_str(r#"<div class="view-cont">"#);
        if let Some(title) = item.title {
            html.push_str(&format!(
                r#"<h4 class="titles"><a href="{}" target="_top">{}</a></h4>"#,
                item.href, title
            ));
        }
        if let Some(summary) = item.summary {
            html.push_str(&format!(
                r#"<p class="lead line-6x2"><a href="{}" target="_top">{}</a></p>"#,
                item.href, summary
            ));
        }
        html.push_str(r#"<span class="byline"><em>기자명</em><em>2024.01.15 10:30</em></span>"#);
        html.push_str("</div></li>");
    }
    html.push_str("</ul></section>");
    if let Some(last) = last_page {
        html.push_str(r#"<ul class="pagination">"#);
        html.push_str(r#"<li class="pagination-start"><a href="?page=1&amp;view_type=sm">처음</a></li>"#);
        for page in 1..=last {
            html.push_str(&format!(r#"<li><a href="?page={}&amp;view_type=sm">{}</a></li>"#, page, page));
        }
        html.push_str(&format!(
            r#"<li class="pagination-end"><a href="?page={}&amp;total=99&amp;view_type=sm">맨끝</a></li>"#,
            last
        ));
        html.push_str("</ul>");
    }
    html.push_str("</div></body></html>");
    html
}

pub(crate) fn rookie_detail(published: Option<&str>, body: &str) -> String {
    let info = match published {
        Some(published) => format!(
            r#"<ul class="infomation"><li><i class="icon-user-o"></i> 김기자 기자</li><li><i class="icon-clock-o"></i> {}</li></ul>"#,
            published
        ),
        None => r#"<ul class="infomation"><li><i class="icon-user-o"></i> 김기자 기자</li></ul>"#.to_string(),
    };
    format!(
        r#"<html><body><header class="article-view-header"><div class="info-group">{}</div></header><article id="article-view-content-div"><p>{}</p></article></body></html>"#,
        info, body
    )
}
