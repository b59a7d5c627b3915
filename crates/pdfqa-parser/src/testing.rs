//! Test fixtures
//!
//! Builds small, well-formed PDF files in memory so tests do not depend on
//! binary fixtures checked into the repository.

/// Build a PDF with one page per entry, each page showing its text in
/// Helvetica on a single line.
pub fn minimal_pdf(pages: &[&str]) -> Vec<u8> {
    let page_count = pages.len();
    // 1: catalog, 2: page tree, 3: font, then a (page, content) pair per page
    let object_count = 3 + 2 * page_count;
    let page_id = |i: usize| 4 + 2 * i;
    let content_id = |i: usize| 5 + 2 * i;

    let mut out: Vec<u8> = Vec::new();
    let mut offsets = vec![0usize; object_count + 1];

    out.extend_from_slice(b"%PDF-1.4\n");

    offsets[1] = out.len();
    out.extend_from_slice(b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");

    let kids = (0..page_count)
        .map(|i| format!("{} 0 R", page_id(i)))
        .collect::<Vec<_>>()
        .join(" ");
    offsets[2] = out.len();
    out.extend_from_slice(
        format!("2 0 obj\n<< /Type /Pages /Kids [{kids}] /Count {page_count} >>\nendobj\n")
            .as_bytes(),
    );

    offsets[3] = out.len();
    out.extend_from_slice(
        b"3 0 obj\n<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>\nendobj\n",
    );

    for (i, text) in pages.iter().enumerate() {
        offsets[page_id(i)] = out.len();
        out.extend_from_slice(
            format!(
                "{} 0 obj\n<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
                 /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>\nendobj\n",
                page_id(i),
                content_id(i)
            )
            .as_bytes(),
        );

        let stream = format!(
            "BT\n/F1 12 Tf\n72 720 Td\n({}) Tj\nET\n",
            escape_pdf_string(text)
        );
        offsets[content_id(i)] = out.len();
        out.extend_from_slice(
            format!(
                "{} 0 obj\n<< /Length {} >>\nstream\n{}endstream\nendobj\n",
                content_id(i),
                stream.len(),
                stream
            )
            .as_bytes(),
        );
    }

    let xref_offset = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", object_count + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for offset in &offsets[1..] {
        out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            object_count + 1,
            xref_offset
        )
        .as_bytes(),
    );

    out
}

fn escape_pdf_string(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '(' | ')' | '\\' => {
                escaped.push('\\');
                escaped.push(c);
            }
            c if c.is_ascii() && !c.is_ascii_control() => escaped.push(c),
            _ => escaped.push('?'),
        }
    }
    escaped
}
