use criterion::{criterion_group, criterion_main, Criterion};
use pyralign::{
    align_images, Affine, AlignConfig, ForwardAdditive, ImagePyramid, ImageView,
    InverseCompositional, ParametricWarp, Translation,
};
use std::hint::black_box;

fn make_image(width: usize, height: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            let (xf, yf) = (x as f32, y as f32);
            let value =
                128.0 + 60.0 * (xf / 13.0).sin() * (yf / 17.0).cos() + 40.0 * ((xf + yf) / 23.0).cos();
            data.push(value as u8);
        }
    }
    data
}

fn extract_patch(
    image: &[u8],
    img_width: usize,
    x0: usize,
    y0: usize,
    width: usize,
    height: usize,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(width * height);
    for y in 0..height {
        let row = (y0 + y) * img_width;
        for x in 0..width {
            out.push(image[row + x0 + x]);
        }
    }
    out
}

fn bench_aligner(c: &mut Criterion) {
    let img_width = 512;
    let img_height = 512;
    let image = make_image(img_width, img_height);
    let image_view = ImageView::from_slice(&image, img_width, img_height).unwrap();

    let tpl_width = 192;
    let tpl_height = 192;
    let tpl_x0 = 120;
    let tpl_y0 = 100;
    let tpl_data = extract_patch(&image, img_width, tpl_x0, tpl_y0, tpl_width, tpl_height);
    let tpl_view = ImageView::from_slice(&tpl_data, tpl_width, tpl_height).unwrap();

    let cfg = AlignConfig {
        pyramid_levels: 4,
        max_iterations: 80,
        eps: 1e-3,
        record_steps: false,
    };
    let initial = Translation::new(tpl_x0 as f32 - 3.5, tpl_y0 as f32 + 2.5);
    let mut initial_affine = Affine::identity();
    initial_affine.p[4] = initial.t.x;
    initial_affine.p[5] = initial.t.y;

    c.bench_function("pyramid_build_512", |b| {
        b.iter(|| black_box(ImagePyramid::build(image_view, 4).unwrap()));
    });

    c.bench_function("forward_additive_translation", |b| {
        b.iter(|| {
            black_box(
                align_images(
                    ForwardAdditive::<Translation, 2>::new(),
                    tpl_view,
                    image_view,
                    initial,
                    &cfg,
                )
                .unwrap(),
            )
        });
    });

    c.bench_function("inverse_compositional_translation", |b| {
        b.iter(|| {
            black_box(
                align_images(
                    InverseCompositional::<Translation, 2>::new(),
                    tpl_view,
                    image_view,
                    initial,
                    &cfg,
                )
                .unwrap(),
            )
        });
    });

    c.bench_function("inverse_compositional_affine", |b| {
        b.iter(|| {
            black_box(
                align_images(
                    InverseCompositional::<Affine, 6>::new(),
                    tpl_view,
                    image_view,
                    initial_affine,
                    &cfg,
                )
                .unwrap(),
            )
        });
    });

    if cfg!(feature = "rayon") {
        c.bench_function("forward_additive_translation_parallel", |b| {
            b.iter(|| {
                black_box(
                    align_images(
                        ForwardAdditive::<Translation, 2>::new().with_parallel(true),
                        tpl_view,
                        image_view,
                        initial,
                        &cfg,
                    )
                    .unwrap(),
                )
            });
        });

        c.bench_function("inverse_compositional_affine_parallel", |b| {
            b.iter(|| {
                black_box(
                    align_images(
                        InverseCompositional::<Affine, 6>::new().with_parallel(true),
                        tpl_view,
                        image_view,
                        initial_affine,
                        &cfg,
                    )
                    .unwrap(),
                )
            });
        });
    }
}

criterion_group!(benches, bench_aligner);
criterion_main!(benches);
