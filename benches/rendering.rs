use criterion::{criterion_group, criterion_main, Criterion};

use bytes::Bytes;
use msghtml::model::attachment::{AttachMethod, Attachment};
use msghtml::model::message::Message;
use msghtml::render::{render_html, RenderOptions};
use msghtml::rtf::compressed::wrap_uncompressed;

const GIF: &[u8] = b"GIF89a\x01\x00\x01\x00\x80\x00\x00\xff\xff\xff\x00\x00\x00!\xf9\x04\x01\x00\x00\x00\x00,\x00\x00\x00\x00\x01\x00\x01\x00\x00\x02\x02D\x01\x00;";

/// `{\rtf1 WXYZWXYZWXYZWXYZWXYZ}` as LZFu.
const LZFU: &[u8] = b"\x1a\x00\x00\x00\x1c\x00\x00\x00LZFu\xe2\xd4KQA\x00\x04 WXYZ\rn}\x01\x0e\xb0";

fn html_message(images: usize) -> Message {
    let mut html = String::from("<html><body>");
    for i in 0..images {
        html.push_str(&format!("<p>Paragraph {i}</p><img src=\"cid:img{i}\">"));
    }
    html.push_str("</body></html>");
    let rtf = format!("{{\\rtf1\\ansi\\fromhtml1 {{\\*\\htmltag0 {html}}}}}");

    Message {
        compressed_rtf: Some(Bytes::from(wrap_uncompressed(rtf.as_bytes()))),
        attachments: (0..images)
            .map(|i| Attachment {
                content_id: Some(format!("img{i}")),
                filename: Some(format!("image{i:03}.gif")),
                mime_tag: Some("image/gif".into()),
                method: AttachMethod::ByValue,
                hidden: true,
                content: Bytes::from_static(GIF),
            })
            .collect(),
        ..Message::default()
    }
}

fn bench_decompress(c: &mut Criterion) {
    c.bench_function("decompress_lzfu", |b| {
        b.iter(|| msghtml::rtf::decompress(LZFU).unwrap())
    });
}

fn bench_render(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let message = html_message(20);
    let options = RenderOptions::default();

    c.bench_function("render_20_inline_images", |b| {
        b.iter(|| runtime.block_on(render_html(&message, &options)).unwrap())
    });
}

criterion_group!(benches, bench_decompress, bench_render);
criterion_main!(benches);
