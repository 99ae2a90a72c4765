use criterion::{black_box, criterion_group, criterion_main, Criterion};

use evc::codec::{self, KEY_LEN};
use evc::stream::DecryptingStream;
use evc::writer::write_encrypted;

const KEY: [u8; KEY_LEN] = [0x7c; KEY_LEN];

fn bench_block_cipher(c: &mut Criterion) {
    let plaintext = vec![0u8; 1024 * 1024];
    c.bench_function("encrypt_1mb_block", |b| {
        b.iter(|| codec::encrypt(black_box(&KEY), black_box(&plaintext)))
    });

    let (iv, ciphertext) = codec::encrypt(&KEY, &plaintext);
    c.bench_function("decrypt_1mb_block", |b| {
        b.iter(|| codec::decrypt(black_box(&KEY), black_box(&iv), black_box(&ciphertext), Some(plaintext.len())))
    });
}

fn bench_sequential_stream_read(c: &mut Criterion) {
    let src = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(src.path(), vec![0u8; 8 * 1024 * 1024]).unwrap();
    let dest = tempfile::NamedTempFile::new().unwrap().into_temp_path();
    write_encrypted(src.path(), &dest, &KEY, 1024 * 1024, &[]).unwrap();

    c.bench_function("sequential_read_8mb_container", |b| {
        b.iter(|| {
            let mut stream = DecryptingStream::open(&dest, KEY).unwrap();
            let mut buf = vec![0u8; 64 * 1024];
            loop {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                black_box(&buf[..n]);
            }
        })
    });
}

criterion_group!(benches, bench_block_cipher, bench_sequential_stream_read);
criterion_main!(benches);
